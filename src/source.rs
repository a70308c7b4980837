use crate::element::Extent;
use crate::error::{Result, ScanError};

/// 点群の読み込み元を表すトレイトです。
///
/// [`PointSource::points`]は遅延評価される有限の列で、一度しか走査できません。
pub trait PointSource {
    /// ファイルが報告する点の総数です。
    fn point_count(&self) -> u64;

    /// ファイルが報告するX・Yの範囲です。
    fn extent(&self) -> Extent;

    /// 点の平面座標`(x, y)`を順に返します。
    fn points(&mut self) -> Box<dyn Iterator<Item = Result<(f64, f64)>> + '_>;
}

/// メモリ上の点の列です。
#[derive(Debug, Clone)]
pub struct MemoryPointSource {
    extent: Extent,
    count: u64,
    points: Vec<(f64, f64)>,
}

impl MemoryPointSource {
    /// 範囲を明示して生成します。
    pub fn new(extent: Extent, points: Vec<(f64, f64)>) -> Self {
        Self { extent, count: points.len() as u64, points }
    }

    /// 点の最小値と最大値から範囲を求めて生成します。
    pub fn from_points(points: Vec<(f64, f64)>) -> Self {
        let extent = points.iter().fold(
            Extent::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |e, &(x, y)| Extent::new(e.min[0].min(x), e.min[1].min(y), e.max[0].max(x), e.max[1].max(y)),
        );

        Self::new(extent, points)
    }
}

impl PointSource for MemoryPointSource {
    fn point_count(&self) -> u64 {
        self.count
    }

    fn extent(&self) -> Extent {
        self.extent
    }

    fn points(&mut self) -> Box<dyn Iterator<Item = Result<(f64, f64)>> + '_> {
        Box::new(std::mem::take(&mut self.points).into_iter().map(Ok::<_, ScanError>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_is_not_restartable() {
        let mut source = MemoryPointSource::from_points(vec![(1., 2.), (-3., 8.)]);
        assert_eq!(source.point_count(), 2);
        assert_eq!(source.extent(), Extent::new(-3., 2., 1., 8.));

        assert_eq!(source.points().count(), 2);
        assert_eq!(source.points().count(), 0);
        assert_eq!(source.point_count(), 2);
    }
}
