use std::path::{Path, PathBuf};

use las::{Read, Reader};

use crate::element::Extent;
use crate::error::{Result, ScanError};
use crate::source::PointSource;

/// LAS/LAZファイルから点を読み込みます。
/// 使用するには`las`featureを有効にしてください。
pub struct LasPointSource {
    path: PathBuf,
    reader: Reader<'static>,
}

impl LasPointSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = Reader::from_path(&path).map_err(|e| ScanError::point_cloud(&path, e))?;

        Ok(Self { path, reader })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PointSource for LasPointSource {
    fn point_count(&self) -> u64 {
        self.reader.header().number_of_points()
    }

    fn extent(&self) -> Extent {
        let las::Bounds { min, max } = self.reader.header().bounds();

        Extent::new(min.x, min.y, max.x, max.y)
    }

    fn points(&mut self) -> Box<dyn Iterator<Item = Result<(f64, f64)>> + '_> {
        let path = &self.path;

        Box::new(self.reader.points().map(move |point| {
            point
                .map(|las::Point { x, y, .. }| (x, y))
                .map_err(|e| ScanError::point_cloud(path, e))
        }))
    }
}
