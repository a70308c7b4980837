use log::debug;

use crate::accumulator::TimingGrid;
use crate::element::BoundingBox;
use crate::error::{Result, ScanError};

/// 各タイルの範囲を合成し、モザイク全体の範囲と大きさを求めます。
#[derive(Debug, Clone, Default)]
pub struct MosaicCompositor {
    bounds: Option<BoundingBox>,
    tiles: usize,
}

impl MosaicCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// タイルの範囲を全体の範囲に加えます。
    pub fn accumulate_bounding_box(&mut self, bbox: &BoundingBox) {
        self.bounds = Some(match self.bounds {
            Some(bounds) => bounds.union(bbox),
            None => *bbox,
        });
        self.tiles += 1;
    }

    /// これまでに加えたすべてのタイルを包含する範囲です。
    pub fn global_box(&self) -> Option<BoundingBox> {
        self.bounds
    }

    pub fn tile_count(&self) -> usize {
        self.tiles
    }

    /// モザイク全体のピクセル数`(幅, 高さ)`を整数除算で求めます。端数は出力に含まれません。
    pub fn compute_global_geometry(global: &BoundingBox, cell_width: i64, cell_height: i64) -> Result<(usize, usize)> {
        global.validate()?;

        if cell_width <= 0 || cell_height <= 0 {
            return Err(ScanError::geometry(format!("cell size {cell_width}x{cell_height} must be positive")));
        }

        let width = (global.width() / cell_width) as usize;
        let height = (global.height() / cell_height) as usize;

        if width == 0 || height == 0 {
            return Err(ScanError::geometry(format!(
                "mosaic of {}x{} with {}x{} cells is empty",
                global.width(), global.height(), cell_width, cell_height
            )));
        }

        Ok((width, height))
    }

    /// 全体の範囲から出力用のバッファを確保します。
    pub fn allocate(&self, cell_width: i64, cell_height: i64) -> Result<MosaicBuffer> {
        let global = self.bounds.ok_or_else(|| ScanError::geometry("no tile bounding box accumulated"))?;
        let (width, height) = Self::compute_global_geometry(&global, cell_width, cell_height)?;

        Ok(MosaicBuffer::new(width, height))
    }
}

/// [`MosaicBuffer::place_tile`]の結果です。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    /// タイルの先頭セルの位置です。
    pub offset: usize,
    pub written: usize,
    /// バッファの外にはみ出して書き込まなかったセル数です。
    pub clipped: usize,
    /// `u32`に収まらず飽和させた値の数です。
    pub saturated: usize,
}

/// 進入時刻・退出時刻・活動期間の3バンドを行優先で保持するバッファです。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicBuffer {
    width: usize,
    height: usize,
    entry: Vec<u32>,
    exit: Vec<u32>,
    active: Vec<u32>,
    tile_shape: Option<(usize, usize)>,
}

impl MosaicBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let len = width * height;

        Self {
            width,
            height,
            entry: vec![0; len],
            exit: vec![0; len],
            active: vec![0; len],
            tile_shape: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn entry(&self) -> &[u32] {
        &self.entry
    }

    pub fn exit(&self) -> &[u32] {
        &self.exit
    }

    pub fn active(&self) -> &[u32] {
        &self.active
    }

    /// `[進入時刻, 退出時刻, 活動期間]`の順でバンドを返します。
    pub fn bands(&self) -> [&[u32]; 3] {
        [&self.entry, &self.exit, &self.active]
    }

    /// タイル1枚が占める要素数です。
    pub fn row_stride(&self, grid_rows: usize) -> usize {
        grid_rows * self.width
    }

    /// タイルの集計結果を処理順の位置に書き込みます。
    ///
    /// `tile_index`番目のタイルは`tile_index × row_stride`から始まる行の帯を占めるため、
    /// 異なる番号のタイルが同じ要素に書き込むことはありません。
    /// バッファに収まらないセルは書き込まずに数えます。
    pub fn place_tile(&mut self, tile_index: usize, grid: &TimingGrid) -> Result<Placement> {
        let shape = (grid.columns(), grid.rows());
        match self.tile_shape {
            None => self.tile_shape = Some(shape),
            Some(expected) if expected != shape => {
                return Err(ScanError::geometry(format!(
                    "tile grid {}x{} does not match the mosaic tile shape {}x{}",
                    shape.0, shape.1, expected.0, expected.1
                )));
            }
            Some(_) => {}
        }

        let first_row = tile_index * grid.rows();
        let mut placement = Placement { offset: tile_index * self.row_stride(grid.rows()), ..Default::default() };

        let to_u32 = |value: u64, saturated: &mut usize| {
            u32::try_from(value).unwrap_or_else(|_| {
                *saturated += 1;
                u32::MAX
            })
        };

        for r in 0..grid.rows() {
            let cells = grid.row(r);
            let row = first_row + r;

            if row >= self.height {
                placement.clipped += cells.len();
                continue;
            }

            let visible = cells.len().min(self.width);
            placement.clipped += cells.len() - visible;

            let start = row * self.width;
            for (c, cell) in cells[..visible].iter().copied().enumerate() {
                let timing = cell.unwrap_or_default();
                let i = start + c;

                self.entry[i] = to_u32(timing.first, &mut placement.saturated);
                self.exit[i] = to_u32(timing.last, &mut placement.saturated);
                self.active[i] = to_u32(timing.active_span(), &mut placement.saturated);
                placement.written += 1;
            }
        }

        debug!(
            "placed tile #{} at offset {}: {} cells written, {} clipped",
            tile_index, placement.offset, placement.written, placement.clipped
        );

        Ok(placement)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::accumulator::GridAccumulator;
    use crate::element::GridGeometry;

    fn tile_grid(base_time: u64) -> TimingGrid {
        let bbox = BoundingBox::new(0, 0, 40, 20);
        let geometry = GridGeometry::from_box(&bbox, 4, 2, 0).unwrap();
        let mut acc = GridAccumulator::new(geometry, bbox);
        acc.record_point(5., 15., base_time + 1);
        acc.record_point(35., 5., base_time + 2);
        acc.record_point(5., 15., base_time + 5);
        acc.finish()
    }

    fn written_indices(before: &MosaicBuffer, after: &MosaicBuffer) -> HashSet<usize> {
        (0..after.entry().len())
            .filter(|&i| before.entry()[i] != after.entry()[i] || before.exit()[i] != after.exit()[i])
            .collect()
    }

    #[test]
    fn union_of_boxes() {
        let mut compositor = MosaicCompositor::new();
        assert_eq!(compositor.global_box(), None);

        compositor.accumulate_bounding_box(&BoundingBox::new(0, 0, 10, 10));
        compositor.accumulate_bounding_box(&BoundingBox::new(5, 5, 20, 20));

        assert_eq!(compositor.global_box(), Some(BoundingBox::new(0, 0, 20, 20)));
        assert_eq!(compositor.tile_count(), 2);
    }

    #[test]
    fn global_geometry_truncates() {
        let global = BoundingBox::new(0, 0, 105, 59);
        assert_eq!(MosaicCompositor::compute_global_geometry(&global, 10, 10).unwrap(), (10, 5));

        assert!(MosaicCompositor::compute_global_geometry(&global, 0, 10).is_err());
        assert!(MosaicCompositor::compute_global_geometry(&global, 200, 10).is_err());
        assert!(MosaicCompositor::compute_global_geometry(&BoundingBox::new(0, 0, 0, 10), 1, 1).is_err());
        assert!(MosaicCompositor::new().allocate(10, 10).is_err());
    }

    #[test]
    fn place_tile_fills_bands_in_lockstep() {
        let mut buffer = MosaicBuffer::new(4, 4);
        let placement = buffer.place_tile(0, &tile_grid(0)).unwrap();

        assert_eq!(placement, Placement { offset: 0, written: 8, clipped: 0, saturated: 0 });
        assert_eq!(&buffer.entry()[..8], &[1, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(&buffer.exit()[..8], &[5, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(&buffer.active()[..8], &[4, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn tiles_write_disjoint_regions() {
        let mut buffer = MosaicBuffer::new(4, 4);
        let stride = buffer.row_stride(2);

        let empty = buffer.clone();
        buffer.place_tile(0, &tile_grid(0)).unwrap();
        let after_first = buffer.clone();
        let second = buffer.place_tile(1, &tile_grid(100)).unwrap();

        let first_written = written_indices(&empty, &after_first);
        let second_written = written_indices(&after_first, &buffer);

        assert_eq!(second.offset, stride);
        assert!(first_written.iter().all(|&i| i < stride));
        assert!(second_written.iter().all(|&i| (stride..2 * stride).contains(&i)));
        assert!(first_written.is_disjoint(&second_written));
        assert_eq!(&buffer.entry()[..8], &after_first.entry()[..8]);
    }

    #[test]
    fn cells_outside_the_buffer_are_clipped() {
        let mut buffer = MosaicBuffer::new(3, 3);
        let first = buffer.place_tile(0, &tile_grid(0)).unwrap();
        assert_eq!(first, Placement { offset: 0, written: 6, clipped: 2, saturated: 0 });

        let second = buffer.place_tile(1, &tile_grid(0)).unwrap();
        assert_eq!(second.written, 3);
        assert_eq!(second.clipped, 5);

        let third = buffer.place_tile(2, &tile_grid(0)).unwrap();
        assert_eq!(third.written, 0);
    }

    #[test]
    fn mismatched_tile_shapes_are_rejected() {
        let mut buffer = MosaicBuffer::new(8, 8);
        buffer.place_tile(0, &tile_grid(0)).unwrap();

        assert!(buffer.place_tile(1, &TimingGrid::new(3, 3)).is_err());
    }

    #[test]
    fn large_times_saturate() {
        let bbox = BoundingBox::new(0, 0, 10, 10);
        let geometry = GridGeometry::from_box(&bbox, 1, 1, 0).unwrap();
        let mut acc = GridAccumulator::new(geometry, bbox);
        acc.record_point(5., 5., 1);
        acc.record_point(5., 5., u64::from(u32::MAX) + 10);

        let mut buffer = MosaicBuffer::new(1, 1);
        let placement = buffer.place_tile(0, &acc.finish()).unwrap();

        assert_eq!(placement.saturated, 2);
        assert_eq!(buffer.bands(), [&[1][..], &[u32::MAX][..], &[u32::MAX][..]]);
    }
}
