use std::fmt;
use std::iter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, ScanError};

/// クラスタ番号の最大値です。
pub const MAX_CLUSTER: u8 = 70;

const ROW_LETTERS: u8 = 8;
const BANDS: u16 = 2;
const COLUMNS: u16 = 2;

/// 1クラスタに含まれるタイルの数です。
pub const TILES_PER_CLUSTER: u16 = ROW_LETTERS as u16 * BANDS * COLUMNS;

/// タイル格子全体に含まれるタイルの数です。
pub const TILE_COUNT: u16 = MAX_CLUSTER as u16 * TILES_PER_CLUSTER;

/// 行の南北区分です。ファイル名では`N`と`Z`で表されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowBand {
    North,
    South,
}

impl RowBand {
    pub fn marker(self) -> char {
        match self {
            RowBand::North => 'N',
            RowBand::South => 'Z',
        }
    }

    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'N' => Some(RowBand::North),
            'Z' => Some(RowBand::South),
            _ => None,
        }
    }
}

/// 測量モザイク上の1タイルを表す識別子です。
///
/// `(クラスタ番号, 行文字, 南北区分, 列番号)`の4桁からなる混合基数のカウンタとして扱います。
/// 基数は下位から`{2 (列), 2 (南北), 8 (A-H), 70 (クラスタ)}`で、
/// フィールドの順序で導出した`Ord`は走査順と一致します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId {
    cluster: u8,
    row: u8,
    band: RowBand,
    column: u8,
}

impl TileId {
    /// 各フィールドを検証してタイル識別子を生成します。
    pub fn new(cluster: u8, row_letter: char, band: RowBand, column: u8) -> Result<Self> {
        let name = format!("{}{}{}{}", cluster, row_letter, band.marker(), column);
        let invalid = |reason| ScanError::TileName { name: name.clone(), reason };

        if !(1..=MAX_CLUSTER).contains(&cluster) {
            return Err(invalid("cluster must be within 1..=70"));
        }
        if !('A'..='H').contains(&row_letter) {
            return Err(invalid("row letter must be within A..=H"));
        }
        if !(1..=2).contains(&column) {
            return Err(invalid("column must be 1 or 2"));
        }

        Ok(Self { cluster, row: row_letter as u8 - b'A', band, column })
    }

    /// `37EN1`のような短いタイル名を解析します。
    ///
    /// 末尾から先頭に向かって、列番号、南北区分、行文字、クラスタ番号(1〜2桁)の順に読み取ります。
    /// 小文字は大文字として扱います。
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason| ScanError::TileName { name: name.to_string(), reason };

        let upper = name.trim().to_ascii_uppercase();
        let mut chars = upper.chars().rev();

        let column = match chars.next() {
            Some(c) if c.is_ascii_digit() => c as u8 - b'0',
            _ => return Err(invalid("expected a trailing column digit")),
        };

        let band = chars
            .next()
            .and_then(RowBand::from_marker)
            .ok_or_else(|| invalid("expected row band marker N or Z"))?;

        let row_letter = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => c,
            _ => return Err(invalid("expected a row letter")),
        };

        let digits = chars.rev().collect::<String>();
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected a one or two digit cluster number"));
        }
        let cluster = digits.parse::<u8>().map_err(|_| invalid("cluster number overflow"))?;

        Self::new(cluster, row_letter, band, column).map_err(|_| invalid("field out of range"))
    }

    pub fn cluster(&self) -> u8 {
        self.cluster
    }

    pub fn row_letter(&self) -> char {
        (b'A' + self.row) as char
    }

    pub fn band(&self) -> RowBand {
        self.band
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    /// 走査順における通し番号(0始まり)を返します。
    pub fn ordinal(&self) -> u16 {
        let band = match self.band {
            RowBand::North => 0,
            RowBand::South => 1,
        };

        (((self.cluster as u16 - 1) * ROW_LETTERS as u16 + self.row as u16) * BANDS + band) * COLUMNS
            + (self.column as u16 - 1)
    }

    /// 通し番号からタイル識別子を復元します。範囲外の場合は`None`を返します。
    pub fn from_ordinal(ordinal: u16) -> Option<Self> {
        if ordinal >= TILE_COUNT {
            return None;
        }

        let column = (ordinal % COLUMNS) as u8 + 1;
        let rest = ordinal / COLUMNS;
        let band = if rest % BANDS == 0 { RowBand::North } else { RowBand::South };
        let rest = rest / BANDS;
        let row = (rest % ROW_LETTERS as u16) as u8;
        let cluster = (rest / ROW_LETTERS as u16) as u8 + 1;

        Some(Self { cluster, row, band, column })
    }

    /// 走査順で次のタイルを返します。
    /// 列が最も速く回り、次に南北区分、行文字(HからAに戻るときにクラスタ番号を繰り上げ)の順に進みます。
    /// `70HZ2`の次は存在しないため`None`を返します。
    pub fn next(&self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1)
    }

    /// 自身から始まり、走査順にタイルを辿るイテレータを返します。
    pub fn walk(self) -> impl Iterator<Item = TileId> {
        iter::successors(Some(self), TileId::next)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", self.cluster, self.row_letter(), self.band.marker(), self.column)
    }
}

impl FromStr for TileId {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// ファイルパスからタイル名を取り出します。
/// `C_37EN1.LAZ`のように`_`を含む場合はその後ろ、含まない場合は拡張子を除いたファイル名全体です。
pub fn tile_name_from_path(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;

    Some(stem.split_once('_').map_or(stem, |(_, name)| name))
}

fn is_point_cloud_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("laz") || ext.eq_ignore_ascii_case("las"))
}

/// 処理対象として計画されたタイルです。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTile {
    pub tile: TileId,
    pub path: PathBuf,
}

/// 入力ディレクトリから見つかったタイルの一覧です。発見順を保持します。
#[derive(Debug, Clone, Default)]
pub struct TileCatalog {
    tiles: IndexMap<TileId, PathBuf, FxBuildHasher>,
}

impl TileCatalog {
    /// ディレクトリ直下の`.las`/`.laz`ファイルを探索します(大文字小文字は区別しません)。
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;

            if entry.file_type().is_file() && is_point_cloud_file(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        Ok(Self::from_paths(paths))
    }

    /// パスの一覧からカタログを構築します。タイル名として解釈できないファイルは警告を出して無視します。
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut catalog = Self::default();

        for path in paths {
            let path = path.into();

            let Some(name) = tile_name_from_path(&path) else {
                warn!("skipping {}: file name is not valid UTF-8", path.display());
                continue;
            };

            match TileId::parse(name) {
                Ok(tile) => {
                    if let Some(previous) = catalog.tiles.get(&tile) {
                        warn!("skipping {}: tile {} already provided by {}", path.display(), tile, previous.display());
                    } else {
                        debug!("found tile {} at {}", tile, path.display());
                        catalog.tiles.insert(tile, path);
                    }
                }
                Err(e) => warn!("skipping {}: {}", path.display(), e),
            }
        }

        catalog
    }

    /// タイルを登録します。同じ識別子が既にある場合は置き換え、以前のパスを返します。
    pub fn insert(&mut self, tile: TileId, path: impl Into<PathBuf>) -> Option<PathBuf> {
        self.tiles.insert(tile, path.into())
    }

    pub fn get(&self, tile: &TileId) -> Option<&Path> {
        self.tiles.get(tile).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TileId, &Path)> {
        self.tiles.iter().map(|(tile, path)| (tile, path.as_path()))
    }

    /// `start`から走査順に`count`枚のタイルを辿り、処理順の一覧を返します。
    /// 途中でファイルが欠けている場合は[`ScanError::TileNotFound`]、
    /// 格子の終端を越える場合は[`ScanError::EndOfMosaic`]を返します。
    pub fn plan(&self, start: TileId, count: usize) -> Result<Vec<PlannedTile>> {
        if count == 0 {
            return Err(ScanError::geometry("tile count must be at least 1"));
        }

        let mut planned = Vec::with_capacity(count);
        let mut current = start;

        for i in 0..count {
            if i > 0 {
                current = current.next().ok_or(ScanError::EndOfMosaic(current))?;
            }

            let path = self.get(&current).ok_or(ScanError::TileNotFound(current))?;

            planned.push(PlannedTile { tile: current, path: path.to_path_buf() });
        }

        Ok(planned)
    }
}
