use std::path::PathBuf;

use thiserror::Error;

use crate::tile::TileId;

/// クレート全体で用いるエラーです。
#[derive(Debug, Error)]
pub enum ScanError {
    /// タイル名が`<クラスタ番号><行文字><N|Z><1|2>`の形式ではありません。
    #[error("invalid tile name `{name}`: {reason}")]
    TileName { name: String, reason: &'static str },

    /// 走査順で次に来るタイルのファイルが見つかりません。
    #[error("tile {0} not found in the input catalog")]
    TileNotFound(TileId),

    /// クラスタ番号70の最後のタイルより先には進めません。
    #[error("no tile follows {0}: end of the mosaic grid")]
    EndOfMosaic(TileId),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("failed to read point cloud {path}: {message}")]
    PointCloud { path: PathBuf, message: String },

    #[error("failed to write raster {path}: {message}")]
    Raster { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;

impl ScanError {
    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        ScanError::InvalidGeometry(message.into())
    }

    pub(crate) fn point_cloud(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ScanError::PointCloud { path: path.into(), message: message.to_string() }
    }

    pub(crate) fn raster(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ScanError::Raster { path: path.into(), message: message.to_string() }
    }
}
