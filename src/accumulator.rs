use crate::element::{BoundingBox, GridGeometry};

/// 1セルに点が最初と最後に記録された時刻です。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellTiming {
    pub first: u64,
    pub last: u64,
}

impl CellTiming {
    /// セルが活動していた期間です。
    pub fn active_span(&self) -> u64 {
        self.last.saturating_sub(self.first)
    }
}

/// 1タイル分のセル時刻の2次元配列です。行優先(北が0行目、西が0列目)で保持します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingGrid {
    columns: usize,
    rows: usize,
    cells: Vec<Option<CellTiming>>,
}

impl TimingGrid {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows, cells: vec![None; columns * rows] }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 一度も点が記録されていないセルは`None`です。
    pub fn get(&self, column: usize, row: usize) -> Option<CellTiming> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells[row * self.columns + column]
    }

    /// 1行分のセルを返します。
    pub fn row(&self, row: usize) -> &[Option<CellTiming>] {
        &self.cells[row * self.columns..(row + 1) * self.columns]
    }

    pub fn visited(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    fn cell_mut(&mut self, column: usize, row: usize) -> &mut Option<CellTiming> {
        &mut self.cells[row * self.columns + column]
    }
}

/// 点の流れをセルごとの初出・最終時刻に集計します。
///
/// 列は範囲の最大X辺から、行は最大Y辺から数えます。
/// 割り当てた配列の外に落ちる点は記録せず、[`GridAccumulator::dropped`]で数だけを返します。
#[derive(Debug, Clone)]
pub struct GridAccumulator {
    geometry: GridGeometry,
    bbox: BoundingBox,
    grid: TimingGrid,
    recorded: u64,
    dropped: u64,
}

impl GridAccumulator {
    pub fn new(geometry: GridGeometry, bbox: BoundingBox) -> Self {
        let grid = TimingGrid::new(geometry.columns(), geometry.rows());

        Self { geometry, bbox, grid, recorded: 0, dropped: 0 }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    /// 座標が落ちるセルの`(列, 行)`を返します。配列の外であれば`None`です。
    ///
    /// 範囲内(境界を含む)の点は必ず余白を除いた格子のいずれかのセルに入ります。
    /// 整数除算の余りの帯と最小側の辺上の点は、最も西の列・最も南の行に含めます。
    pub fn cell_index(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let g = &self.geometry;
        let b = &self.bbox;

        let mut from_east = ((b.max_x() as f64 - x) / g.cell_width as f64).floor();
        let mut from_north = ((b.max_y() as f64 - y) / g.cell_height as f64).floor();

        if !from_east.is_finite() || !from_north.is_finite() {
            return None;
        }

        if (b.min_x() as f64..=b.max_x() as f64).contains(&x) {
            from_east = from_east.min((g.cell_count_x - 1) as f64);
        }
        if (b.min_y() as f64..=b.max_y() as f64).contains(&y) {
            from_north = from_north.min((g.cell_count_y - 1) as f64);
        }

        let column = (g.cell_count_x + g.margin) as f64 - 1. - from_east;
        let row = g.margin as f64 + from_north;

        if column < 0. || row < 0. || column >= g.columns() as f64 || row >= g.rows() as f64 {
            return None;
        }

        Some((column as usize, row as usize))
    }

    /// 点を1つ記録します。セルが未設定であれば初出時刻を設定し、最終時刻は常に更新します。
    /// `time`は呼び出しごとに単調非減少である必要があります。
    /// 時刻が巻き戻った場合、最終時刻はそれまでの値を保ちます。
    pub fn record_point(&mut self, x: f64, y: f64, time: u64) -> bool {
        let Some((column, row)) = self.cell_index(x, y) else {
            self.dropped += 1;
            return false;
        };

        let cell = self.grid.cell_mut(column, row).get_or_insert(CellTiming { first: time, last: time });
        cell.last = cell.last.max(time);

        self.recorded += 1;
        true
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// 現在までの集計結果を参照します。
    pub fn grid(&self) -> &TimingGrid {
        &self.grid
    }

    /// 集計を終了して結果を返します。
    pub fn finish(self) -> TimingGrid {
        self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator(margin: usize) -> GridAccumulator {
        let bbox = BoundingBox::new(0, 0, 100, 100);
        let geometry = GridGeometry::from_box(&bbox, 10, 10, margin).unwrap();
        GridAccumulator::new(geometry, bbox)
    }

    #[test]
    fn records_first_and_last_time_per_cell() {
        let mut acc = accumulator(0);
        assert!(acc.record_point(5., 5., 1));
        assert!(acc.record_point(5., 5., 2));
        assert!(acc.record_point(95., 95., 3));

        let grid = acc.finish();
        let south_west = grid.get(0, 9).unwrap();
        assert_eq!(south_west, CellTiming { first: 1, last: 2 });
        assert_eq!(south_west.active_span(), 1);

        let north_east = grid.get(9, 0).unwrap();
        assert_eq!(north_east, CellTiming { first: 3, last: 3 });
        assert_eq!(north_east.active_span(), 0);

        assert_eq!(grid.visited(), 2);
        assert_eq!(grid.get(5, 5), None);
    }

    #[test]
    fn time_zero_is_a_valid_first_time() {
        let mut acc = accumulator(0);
        acc.record_point(50., 50., 0);
        acc.record_point(50., 50., 7);

        assert_eq!(acc.grid().get(4, 5), Some(CellTiming { first: 0, last: 7 }));
    }

    #[test]
    fn points_outside_the_grid_are_dropped_and_counted() {
        let mut acc = accumulator(0);
        assert!(!acc.record_point(100.5, 50., 1));
        assert!(!acc.record_point(50., -0.5, 2));
        assert!(!acc.record_point(f64::NAN, 50., 3));
        assert!(acc.record_point(100., 100., 4));

        assert_eq!(acc.dropped(), 3);
        assert_eq!(acc.recorded(), 1);
        assert_eq!(acc.grid().get(9, 0), Some(CellTiming { first: 4, last: 4 }));
    }

    #[test]
    fn margin_catches_points_just_outside_the_box() {
        let mut acc = accumulator(1);
        assert_eq!(acc.grid().columns(), 12);

        assert_eq!(acc.cell_index(5., 95.), Some((1, 1)));
        assert_eq!(acc.cell_index(0., 0.), Some((1, 10)));
        assert_eq!(acc.cell_index(-3., 50.), Some((0, 6)));
        assert_eq!(acc.cell_index(50., -5.), Some((5, 11)));
        assert_eq!(acc.cell_index(105., 50.), Some((11, 6)));
        assert_eq!(acc.cell_index(115., 50.), None);

        assert!(acc.record_point(-3., -5., 1));
        assert_eq!(acc.dropped(), 0);
    }

    #[test]
    fn min_edges_belong_to_the_grid_without_margin() {
        let mut acc = accumulator(0);
        assert!(acc.record_point(0., 50., 1));
        assert!(acc.record_point(50., 0., 2));
        assert!(acc.record_point(0., 0., 3));

        assert_eq!(acc.dropped(), 0);
        assert_eq!(acc.grid().get(0, 5), Some(CellTiming { first: 1, last: 1 }));
        assert_eq!(acc.grid().get(4, 9), Some(CellTiming { first: 2, last: 2 }));
        assert_eq!(acc.grid().get(0, 9), Some(CellTiming { first: 3, last: 3 }));

        assert!(!acc.record_point(-0.5, 50., 4));
        assert!(!acc.record_point(50., -0.5, 5));
        assert_eq!(acc.dropped(), 2);
    }

    #[test]
    fn remainder_strip_joins_the_westernmost_column() {
        let bbox = BoundingBox::new(0, 0, 105, 100);
        let geometry = GridGeometry::from_box(&bbox, 10, 10, 0).unwrap();
        let mut acc = GridAccumulator::new(geometry, bbox);

        assert_eq!(acc.cell_index(2., 50.), Some((0, 5)));
        assert_eq!(acc.cell_index(7., 50.), Some((0, 5)));
        assert_eq!(acc.cell_index(15.5, 50.), Some((1, 5)));

        assert!(acc.record_point(2., 50., 3));
        assert_eq!(acc.dropped(), 0);
    }

    #[test]
    fn rewound_time_keeps_the_latest_exit() {
        let mut acc = accumulator(0);
        acc.record_point(50., 50., 5);
        acc.record_point(50., 50., 3);

        let cell = acc.grid().get(4, 5).unwrap();
        assert_eq!(cell, CellTiming { first: 5, last: 5 });
        assert_eq!(cell.active_span(), 0);

        assert_eq!(CellTiming { first: 5, last: 3 }.active_span(), 0);
    }

    #[test]
    fn grid_view_is_stable_and_matches_finish() {
        let mut acc = accumulator(0);
        acc.record_point(12., 34., 1);
        acc.record_point(56., 78., 2);

        let first = acc.grid().clone();
        let second = acc.grid().clone();
        assert_eq!(first, second);
        assert_eq!(acc.finish(), first);
    }
}
