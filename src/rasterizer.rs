use std::marker::PhantomData;
use std::path::Path;

use chrono::Utc;
use log::{info, warn};

use crate::accumulator::{GridAccumulator, TimingGrid};
use crate::element::{BoundingBox, GridGeometry};
use crate::error::{Result, ScanError};
use crate::mosaic::{MosaicCompositor, Placement};
use crate::params::{default_params, GridParams, ScanOptions, TimeSource};
use crate::raster::{GeoTransform, TimingRaster};
use crate::source::PointSource;
use crate::tile::{PlannedTile, TileId};

const PROGRESS_INTERVAL: u64 = 20_000;

/// 処理全体を通じた点の通し番号と、記録する時刻を管理します。
#[derive(Debug, Clone)]
pub struct ScanClock {
    source: TimeSource,
    ordinal: u64,
    last_wall: u64,
}

impl ScanClock {
    pub fn new(source: TimeSource) -> Self {
        Self { source, ordinal: 0, last_wall: 0 }
    }

    /// 次の点に進み、その通し番号(1始まり)を返します。
    pub fn tick(&mut self) -> u64 {
        self.ordinal += 1;
        self.ordinal
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// 現在の点に記録する時刻です。壁時計が巻き戻った場合も前回の値を下回りません。
    pub fn time(&mut self) -> u64 {
        match self.source {
            TimeSource::StreamOrder => self.ordinal,
            TimeSource::WallClock => {
                let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
                self.last_wall = self.last_wall.max(now);
                self.last_wall
            }
        }
    }
}

/// 1タイル分の集計の内訳です。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStats {
    pub points_read: u64,
    pub points_recorded: u64,
    /// 格子の外に落ちて記録しなかった点の数です。
    pub points_dropped: u64,
}

/// 処理したタイルごとの報告です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileReport {
    pub tile: TileId,
    pub bbox: BoundingBox,
    pub stats: TileStats,
    pub placement: Placement,
}

/// [`ScanRasterizer::rasterize`]の結果です。
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub raster: TimingRaster,
    pub reports: Vec<TileReport>,
}

/// 複数のタイルを走査順に読み、セルごとの進入時刻・退出時刻・活動期間のラスタを生成します。
pub struct ScanRasterizer<Params: GridParams = default_params::Ahn3> {
    options: ScanOptions,
    _param: PhantomData<Params>,
}

impl<Params: GridParams> ScanRasterizer<Params> {
    pub fn new(options: ScanOptions) -> Self {
        Self { options, _param: PhantomData }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// 点群の範囲を`Params::ROUNDING`で丸め、タイルの範囲と格子を求めます。
    pub fn layout<S: PointSource>(&self, source: &S) -> Result<(BoundingBox, GridGeometry)> {
        let bbox = BoundingBox::from_extent(&source.extent(), Params::ROUNDING)?;
        let geometry = GridGeometry::from_box(&bbox, self.options.cell_count_x, self.options.cell_count_y, Params::MARGIN)?;

        Ok((bbox, geometry))
    }

    /// 1タイル分の点をすべて読み、間引き間隔に当たる点だけを格子に記録します。
    pub fn accumulate_tile<S: PointSource>(
        &self,
        source: &mut S,
        bbox: BoundingBox,
        geometry: GridGeometry,
        clock: &mut ScanClock,
    ) -> Result<(TimingGrid, TileStats)> {
        let total = source.point_count();
        let thinning = self.options.thinning;
        let mut accumulator = GridAccumulator::new(geometry, bbox);

        let mut points_read = 0_u64;
        let mut last_percentage = None;

        for point in source.points() {
            let (x, y) = point?;
            points_read += 1;

            let ordinal = clock.tick();
            if ordinal % thinning == 0 {
                let time = clock.time();
                accumulator.record_point(x, y, time);
            }

            if points_read % PROGRESS_INTERVAL == 0 && total > 0 {
                let percentage = (points_read as f64 / total as f64 * 100.).round() as u64;
                if last_percentage != Some(percentage) {
                    info!("{}% done", percentage);
                    last_percentage = Some(percentage);
                }
            }
        }

        let stats = TileStats {
            points_read,
            points_recorded: accumulator.recorded(),
            points_dropped: accumulator.dropped(),
        };

        Ok((accumulator.finish(), stats))
    }

    /// 計画されたタイルを順に処理してモザイクを組み立てます。
    ///
    /// まず全タイルのヘッダから範囲を読んでモザイクの大きさを確定し、バッファを一度だけ確保します。
    /// その後、各タイルの点を読み、処理順の位置に書き込みます。
    /// モザイクのセルの大きさには最初のタイルの値を用います。
    pub fn rasterize<S, F>(&self, tiles: &[PlannedTile], mut open: F) -> Result<ScanOutcome>
    where
        S: PointSource,
        F: FnMut(&Path) -> Result<S>,
    {
        let Some(first) = tiles.first() else {
            return Err(ScanError::geometry("no tiles to process"));
        };

        let mut compositor = MosaicCompositor::new();
        let mut layouts = Vec::with_capacity(tiles.len());

        for planned in tiles {
            let source = open(&planned.path)?;
            let (bbox, geometry) = self.layout(&source)?;

            info!(
                "tile {}: bbox ({}, {}) - ({}, {}), {} points",
                planned.tile, bbox.min_x(), bbox.min_y(), bbox.max_x(), bbox.max_y(), source.point_count()
            );

            compositor.accumulate_bounding_box(&bbox);
            layouts.push((bbox, geometry));
        }

        let (_, reference) = layouts[0];
        for (planned, (_, geometry)) in tiles.iter().zip(&layouts).skip(1) {
            if (geometry.cell_width, geometry.cell_height) != (reference.cell_width, reference.cell_height) {
                warn!(
                    "tile {} has {}x{} cells but the mosaic uses {}x{} from tile {}",
                    planned.tile, geometry.cell_width, geometry.cell_height,
                    reference.cell_width, reference.cell_height, first.tile
                );
            }
        }

        let global = compositor
            .global_box()
            .ok_or_else(|| ScanError::geometry("no tile bounding box accumulated"))?;
        let mut buffer = compositor.allocate(reference.cell_width, reference.cell_height)?;

        info!(
            "mosaic bbox ({}, {}) - ({}, {}) as {}x{} pixels",
            global.min_x(), global.min_y(), global.max_x(), global.max_y(), buffer.width(), buffer.height()
        );

        let mut clock = ScanClock::new(self.options.time_source);
        let mut reports = Vec::with_capacity(tiles.len());

        for (index, (planned, (bbox, geometry))) in tiles.iter().zip(layouts).enumerate() {
            info!("processing tile {} ({}/{})", planned.tile, index + 1, tiles.len());

            let mut source = open(&planned.path)?;
            let (grid, stats) = self.accumulate_tile(&mut source, bbox, geometry, &mut clock)?;

            if stats.points_dropped > 0 {
                warn!("tile {}: {} points fell outside the grid", planned.tile, stats.points_dropped);
            }

            let placement = buffer.place_tile(index, &grid)?;
            if placement.clipped > 0 {
                warn!("tile {}: {} cells did not fit the mosaic", planned.tile, placement.clipped);
            }
            if placement.saturated > 0 {
                warn!("tile {}: {} timing values saturated at u32::MAX", planned.tile, placement.saturated);
            }

            reports.push(TileReport { tile: planned.tile, bbox, stats, placement });
        }

        let transform = GeoTransform {
            origin_x: global.min_x() as f64,
            origin_y: global.max_y() as f64,
            pixel_width: reference.cell_width as f64,
            pixel_height: reference.cell_height as f64,
        };

        Ok(ScanOutcome {
            raster: TimingRaster { buffer, transform, epsg: Params::EPSG },
            reports,
        })
    }

    /// LAS/LAZファイルのタイルを処理します。
    /// 使用するには`las`featureを有効にしてください。
    #[cfg(feature = "las")]
    pub fn rasterize_las(&self, tiles: &[PlannedTile]) -> Result<ScanOutcome> {
        self.rasterize(tiles, |path: &Path| crate::las::LasPointSource::open(path))
    }
}
