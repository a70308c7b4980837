use num::ToPrimitive;
use vec_x::VecX;

use crate::error::{Result, ScanError};

pub type Point2D<P> = VecX<P, 2>;

/// 点群ファイルが報告する浮動小数点の範囲です。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: Point2D<f64>,
    pub max: Point2D<f64>,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min: Point2D::new([min_x, min_y]),
            max: Point2D::new([max_x, max_y]),
        }
    }
}

/// 範囲の角を整数座標に揃える方法です。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsRounding {
    /// 小数部を切り捨てます。
    Truncate,
    /// 切り捨てた後、一の位が9であれば1を加えます。
    /// AHN3のタイルの角は整数なので、`84999.99`のような誤差を`85000`に戻します。
    BumpTrailingNine,
    /// 10の倍数に丸めます。
    NearestTen,
    /// 1000の倍数に丸めます。
    NearestThousand,
}

impl BoundsRounding {
    pub fn apply(self, value: f64) -> Result<i64> {
        let to_int = |v: f64| {
            v.to_i64().ok_or_else(|| ScanError::geometry(format!("coordinate {value} is not representable")))
        };

        match self {
            BoundsRounding::Truncate => to_int(value.trunc()),
            BoundsRounding::BumpTrailingNine => {
                let truncated = to_int(value.trunc())?;
                if truncated.rem_euclid(10) == 9 {
                    Ok(truncated + 1)
                } else {
                    Ok(truncated)
                }
            }
            BoundsRounding::NearestTen => Ok(to_int((value / 10.).round())? * 10),
            BoundsRounding::NearestThousand => Ok(to_int((value / 1000.).round())? * 1000),
        }
    }
}

/// 投影座標系上の整数の矩形範囲です。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Point2D<i64>,
    pub max: Point2D<i64>,
}

impl BoundingBox {
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min: Point2D::new([min_x, min_y]),
            max: Point2D::new([max_x, max_y]),
        }
    }

    /// 点群の範囲を指定した方法で丸めて整数の範囲にします。
    pub fn from_extent(extent: &Extent, rounding: BoundsRounding) -> Result<Self> {
        Ok(Self::new(
            rounding.apply(extent.min[0])?,
            rounding.apply(extent.min[1])?,
            rounding.apply(extent.max[0])?,
            rounding.apply(extent.max[1])?,
        ))
    }

    pub fn min_x(&self) -> i64 {
        self.min[0]
    }

    pub fn min_y(&self) -> i64 {
        self.min[1]
    }

    pub fn max_x(&self) -> i64 {
        self.max[0]
    }

    pub fn max_y(&self) -> i64 {
        self.max[1]
    }

    pub fn width(&self) -> i64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> i64 {
        self.max[1] - self.min[1]
    }

    /// 2つの範囲を包含する範囲を返します。
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.batch_with(other.min, |a, b| a.min(b)),
            max: self.max.batch_with(other.max, |a, b| a.max(b)),
        }
    }

    /// 幅と高さがともに正であることを確認します。
    pub fn validate(&self) -> Result<()> {
        if self.width() <= 0 || self.height() <= 0 {
            return Err(ScanError::geometry(format!(
                "degenerate bounding box ({}, {}) - ({}, {})",
                self.min_x(), self.min_y(), self.max_x(), self.max_y()
            )));
        }
        Ok(())
    }
}

/// タイル(またはモザイク)を覆うセルの分割です。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub cell_count_x: usize,
    pub cell_count_y: usize,
    pub cell_width: i64,
    pub cell_height: i64,
    /// 境界の丸め誤差を吸収するために四辺に追加するセル数です。
    pub margin: usize,
}

impl GridGeometry {
    /// 範囲をセル数で等分します。セルの大きさは整数除算で求め、余りは最小側の辺に寄せられます。
    pub fn from_box(bbox: &BoundingBox, cell_count_x: usize, cell_count_y: usize, margin: usize) -> Result<Self> {
        if cell_count_x == 0 || cell_count_y == 0 {
            return Err(ScanError::geometry("cell count must be at least 1"));
        }
        bbox.validate()?;

        let cell_width = bbox.width() / cell_count_x as i64;
        let cell_height = bbox.height() / cell_count_y as i64;

        if cell_width == 0 || cell_height == 0 {
            return Err(ScanError::geometry(format!(
                "{}x{} cells do not fit a {}x{} box",
                cell_count_x, cell_count_y, bbox.width(), bbox.height()
            )));
        }

        Ok(Self { cell_count_x, cell_count_y, cell_width, cell_height, margin })
    }

    /// 余白を含めた列数です。
    pub fn columns(&self) -> usize {
        self.cell_count_x + 2 * self.margin
    }

    /// 余白を含めた行数です。
    pub fn rows(&self) -> usize {
        self.cell_count_y + 2 * self.margin
    }
}
