use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::error::{Result, ScanError};
use crate::mosaic::MosaicBuffer;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;

const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// 北が上のラスタのアフィン変換です。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// GDAL形式の`(originX, pixelWidth, 0, originY, 0, -pixelHeight)`を返します。
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_width, 0., self.origin_y, 0., -self.pixel_height]
    }
}

/// 書き出す3バンドのラスタと、その位置情報です。
#[derive(Debug, Clone, PartialEq)]
pub struct TimingRaster {
    pub buffer: MosaicBuffer,
    pub transform: GeoTransform,
    pub epsg: u32,
}

/// ラスタをファイルに書き出すためのトレイトです。
pub trait RasterWriter {
    fn write(&self, path: &Path, raster: &TimingRaster) -> Result<()>;
}

/// `tiff`クレートでGeoTIFFを書き出します。
/// 3バンド(進入時刻・退出時刻・活動期間)を`u32`の画素インターリーブで格納します。
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffWriter;

impl GeoTiffWriter {
    fn geo_keys(epsg: u32) -> Result<[u16; 16]> {
        let epsg = u16::try_from(epsg)
            .map_err(|_| ScanError::geometry(format!("EPSG code {epsg} does not fit a GeoTIFF short key")))?;

        Ok([
            1, 1, 0, 3,
            GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_PROJECTED,
            GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
            PROJECTED_CS_TYPE_GEO_KEY, 0, 1, epsg,
        ])
    }
}

impl RasterWriter for GeoTiffWriter {
    fn write(&self, path: &Path, raster: &TimingRaster) -> Result<()> {
        let err = |e: tiff::TiffError| ScanError::raster(path, e);

        let buffer = &raster.buffer;
        let width = u32::try_from(buffer.width()).map_err(|e| ScanError::raster(path, e))?;
        let height = u32::try_from(buffer.height()).map_err(|e| ScanError::raster(path, e))?;
        let geo_keys = Self::geo_keys(raster.epsg)?;

        let [entry, exit, active] = buffer.bands();
        let interleaved = entry
            .iter()
            .zip(exit)
            .zip(active)
            .flat_map(|((&entry, &exit), &active)| [entry, exit, active])
            .collect::<Vec<u32>>();

        info!("writing {}x{} GeoTIFF to {}", width, height, path.display());

        let file = File::create(path).map_err(|e| ScanError::raster(path, e))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(err)?;
        let mut image = encoder.new_image::<colortype::RGB32>(width, height).map_err(err)?;

        let t = &raster.transform;
        let directory = image.encoder();
        directory
            .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE_TAG), &[t.pixel_width, t.pixel_height, 0.][..])
            .map_err(err)?;
        directory
            .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT_TAG), &[0., 0., 0., t.origin_x, t.origin_y, 0.][..])
            .map_err(err)?;
        directory
            .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY_TAG), &geo_keys[..])
            .map_err(err)?;

        image.write_data(&interleaved).map_err(err)?;

        Ok(())
    }
}

/// GDALのGTiffドライバでラスタを書き出します。
/// 使用するには`gdal`featureを有効にしてください。
#[cfg(feature = "gdal")]
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalWriter;

#[cfg(feature = "gdal")]
impl RasterWriter for GdalWriter {
    fn write(&self, path: &Path, raster: &TimingRaster) -> Result<()> {
        use gdal::raster::Buffer;
        use gdal::spatial_ref::SpatialRef;
        use gdal::DriverManager;

        let err = |e: gdal::errors::GdalError| ScanError::raster(path, e);

        let (width, height) = (raster.buffer.width(), raster.buffer.height());

        info!("writing {}x{} GeoTIFF to {} with GDAL", width, height, path.display());

        let driver = DriverManager::get_driver_by_name("GTiff").map_err(err)?;
        let mut dataset = driver.create_with_band_type::<u32, _>(path, width, height, 3).map_err(err)?;

        dataset.set_geo_transform(&raster.transform.to_gdal()).map_err(err)?;

        let srs = SpatialRef::from_epsg(raster.epsg).map_err(err)?;
        dataset.set_spatial_ref(&srs).map_err(err)?;

        for (i, data) in raster.buffer.bands().into_iter().enumerate() {
            let mut band = dataset.rasterband(i + 1).map_err(err)?;
            let mut buffer = Buffer::new((width, height), data.to_vec());
            band.write((0, 0), (width, height), &mut buffer).map_err(err)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gdal_transform_layout() {
        let t = GeoTransform { origin_x: 85000., origin_y: 450_000., pixel_width: 20., pixel_height: 25. };
        assert_eq!(t.to_gdal(), [85000., 20., 0., 450_000., 0., -25.]);
    }

    #[test]
    fn geo_keys_embed_the_epsg_code() {
        let keys = GeoTiffWriter::geo_keys(28992).unwrap();
        assert_eq!(keys[3], 3);
        assert_eq!(&keys[12..], &[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, 28992]);
        assert!(GeoTiffWriter::geo_keys(100_000).is_err());
    }
}
