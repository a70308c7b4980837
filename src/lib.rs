#[cfg(not(target_env = "msvc"))]
#[cfg(feature = "jamalloc")]
use tikv_jemallocator::Jemalloc;
pub use vec_x;

#[cfg(not(target_env = "msvc"))]
#[cfg(feature = "jamalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

pub mod accumulator;
pub mod element;
pub mod error;
#[cfg(feature = "las")]
pub mod las;
pub mod mosaic;
pub mod params;
pub mod raster;
pub mod rasterizer;
pub mod source;
pub mod tile;

pub use accumulator::{CellTiming, GridAccumulator, TimingGrid};
pub use element::{BoundingBox, BoundsRounding, Extent, GridGeometry, Point2D};
pub use error::{Result, ScanError};
#[cfg(feature = "las")]
pub use crate::las::LasPointSource;
pub use mosaic::{MosaicBuffer, MosaicCompositor, Placement};
pub use params::{default_params, GridParams, ScanOptions, TimeSource};
#[cfg(feature = "gdal")]
pub use raster::GdalWriter;
pub use raster::{GeoTiffWriter, GeoTransform, RasterWriter, TimingRaster};
pub use rasterizer::{ScanClock, ScanOutcome, ScanRasterizer, TileReport, TileStats};
pub use source::{MemoryPointSource, PointSource};
pub use tile::{PlannedTile, RowBand, TileCatalog, TileId};
