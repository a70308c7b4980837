use crate::element::BoundsRounding;
use crate::error::{Result, ScanError};

/// 格子の余白と範囲の丸め方、出力の座標参照系をまとめた型レベルの設定です。
pub trait GridParams {
    /// タイルの格子の四辺に追加するセル数です。
    const MARGIN: usize;
    /// 点群ファイルの範囲を整数に揃える方法です。
    const ROUNDING: BoundsRounding;
    /// 出力ラスタに埋め込むEPSGコードです。
    const EPSG: u32;
}

pub mod default_params {
    use super::*;

    /// AHN3のタイル向けの設定です。角の誤差を`BumpTrailingNine`で戻し、各辺に1セルの余白を持ちます。
    pub struct Ahn3;

    impl GridParams for Ahn3 {
        const MARGIN: usize = 1;
        const ROUNDING: BoundsRounding = BoundsRounding::BumpTrailingNine;
        const EPSG: u32 = 28992;
    }

    /// 余白を持たず、範囲を切り捨てるだけの設定です。
    pub struct Exact;

    impl GridParams for Exact {
        const MARGIN: usize = 0;
        const ROUNDING: BoundsRounding = BoundsRounding::Truncate;
        const EPSG: u32 = 28992;
    }
}

/// セルに記録する「時刻」の取り方です。1回の処理の中で混在させることはできません。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeSource {
    /// 処理全体の点の通し番号(1始まり)です。タイルごとにはリセットされません。
    #[default]
    StreamOrder,
    /// 点を処理した瞬間のUNIX時刻(秒)です。
    WallClock,
}

/// 実行時に指定する処理の設定です。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub cell_count_x: usize,
    pub cell_count_y: usize,
    pub thinning: u64,
    pub time_source: TimeSource,
}

impl ScanOptions {
    pub fn builder() -> BuildScanOptions {
        BuildScanOptions::default()
    }
}

/// [`ScanOptions`]を構築するためのビルダーです。
#[derive(Debug, Clone, Default)]
pub struct BuildScanOptions {
    cell_count_x: Option<usize>,
    cell_count_y: Option<usize>,
    thinning: Option<u64>,
    time_source: TimeSource,
}

impl BuildScanOptions {
    /// <必須>
    /// 1タイルを縦横それぞれいくつのセルに分割するかを指定します。
    pub fn cell_count(mut self, cell_count: usize) -> Self {
        self.cell_count_x = Some(cell_count);
        self.cell_count_y = Some(cell_count);
        self
    }

    /// <任意>
    /// 縦横で異なるセル数を指定します。`cell_count`の値を置き換えます。
    pub fn cell_counts(mut self, x: usize, y: usize) -> Self {
        self.cell_count_x = Some(x);
        self.cell_count_y = Some(y);
        self
    }

    /// <任意>
    /// 点の間引き間隔です。`n`番目ごとの点だけを記録します。デフォルトは1(間引きなし)です。
    pub fn thinning(mut self, thinning: u64) -> Self {
        self.thinning = Some(thinning);
        self
    }

    /// <任意>
    /// 時刻の取り方を指定します。デフォルトは[`TimeSource::StreamOrder`]です。
    pub fn time_source(mut self, time_source: TimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn build(self) -> Result<ScanOptions> {
        let (Some(cell_count_x), Some(cell_count_y)) = (self.cell_count_x, self.cell_count_y) else {
            return Err(ScanError::geometry("cell count is required"));
        };
        if cell_count_x == 0 || cell_count_y == 0 {
            return Err(ScanError::geometry("cell count must be at least 1"));
        }

        let thinning = self.thinning.unwrap_or(1);
        if thinning == 0 {
            return Err(ScanError::geometry("thinning factor must be at least 1"));
        }

        Ok(ScanOptions { cell_count_x, cell_count_y, thinning, time_source: self.time_source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let options = ScanOptions::builder().cell_count(250).build().unwrap();
        assert_eq!(options.cell_count_x, 250);
        assert_eq!(options.cell_count_y, 250);
        assert_eq!(options.thinning, 1);
        assert_eq!(options.time_source, TimeSource::StreamOrder);
    }

    #[test]
    fn builder_validates() {
        assert!(ScanOptions::builder().build().is_err());
        assert!(ScanOptions::builder().cell_count(0).build().is_err());
        assert!(ScanOptions::builder().cell_count(10).thinning(0).build().is_err());

        let options = ScanOptions::builder()
            .cell_count(10)
            .cell_counts(8, 4)
            .thinning(3)
            .time_source(TimeSource::WallClock)
            .build()
            .unwrap();
        assert_eq!((options.cell_count_x, options.cell_count_y, options.thinning), (8, 4, 3));
    }
}
