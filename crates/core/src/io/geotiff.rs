//! GeoTIFF reading and writing via the `tiff` crate.
//!
//! Reads the georeferencing tags (ModelPixelScale + ModelTiepoint), the
//! `GDAL_NODATA` sentinel and, when present, the EPSG code from the
//! GeoKey directory. Writes single-band float32 with the same tags, so
//! outputs open cleanly in QGIS/GDAL.

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// File-level nodata sentinel for float32 outputs.
///
/// In memory nodata is NaN; on disk it becomes this value, recorded in
/// the `GDAL_NODATA` tag.
pub const NODATA_SENTINEL: f32 = -9999.0;

// TIFF tag ids 33550/33922/34735/42113 have named variants in the `tiff`
// crate's `Tag` enum (ModelPixelScaleTag, ModelTiepointTag,
// GeoKeyDirectoryTag, GdalNodata). The decoder keys its directory by those
// named variants, so lookups must use the same names rather than
// `Tag::Unknown(..)`, which is a distinct, non-matching enum variant.
const TAG_MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const TAG_MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const TAG_GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const TAG_GDAL_NODATA: Tag = Tag::GdalNodata;

// GeoKey ids
const KEY_GT_MODEL_TYPE: u16 = 1024;
const KEY_GT_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

/// Read a single-band GeoTIFF into a raster.
///
/// Cells equal to the file's `GDAL_NODATA` sentinel become NaN for
/// floating-point targets; for integer targets the sentinel is kept as
/// the raster's nodata value when it is representable.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder = Decoder::new(file).map_err(|e| Error::tiff(e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::tiff(format!("cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::tiff(format!("cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I8(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions { rows, cols });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    if let Some(crs) = read_crs(&mut decoder) {
        raster.set_crs(Some(crs));
    }
    apply_nodata_sentinel(&mut decoder, &mut raster);

    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::ToPrimitive + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

/// GeoTransform from ModelPixelScale + ModelTiepoint
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(TAG_MODEL_PIXEL_SCALE)
        .map_err(|_| Error::tiff("no pixel scale tag"))?;

    let tiepoint = decoder
        .get_tag_f64_vec(TAG_MODEL_TIEPOINT)
        .map_err(|_| Error::tiff("no tiepoint tag"))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [Sx, Sy, Sz]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];

        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::tiff("cannot determine geotransform"))
}

/// EPSG code from the GeoKey directory, if one is recorded
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys = decoder
        .get_tag_u32_vec(TAG_GEO_KEY_DIRECTORY)
        .ok()?;

    // Directory header is 4 shorts, then 4 shorts per key entry:
    // key id, tag location (0 = inline), count, value.
    for entry in keys.get(4..)?.chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key as u16 {
            KEY_PROJECTED_CS_TYPE | KEY_GEOGRAPHIC_TYPE => {
                return Some(Crs::from_epsg(value));
            }
            _ => {}
        }
    }

    None
}

/// Fold the `GDAL_NODATA` sentinel into the raster's nodata model
fn apply_nodata_sentinel<T, R>(decoder: &mut Decoder<R>, raster: &mut Raster<T>)
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let text = match decoder.get_tag_ascii_string(TAG_GDAL_NODATA) {
        Ok(t) => t,
        Err(_) => return,
    };
    let sentinel: f64 = match text.trim().trim_end_matches('\0').parse() {
        Ok(v) => v,
        Err(_) => return,
    };

    if T::is_float() {
        for v in raster.data_mut().iter_mut() {
            if let Some(x) = v.to_f64() {
                if (x - sentinel).abs() < 1e-6 {
                    *v = T::default_nodata();
                }
            }
        }
    } else if let Some(nd) = num_traits::cast::<f64, T>(sentinel) {
        raster.set_nodata(Some(nd));
    }
}

/// Write a raster as a single-band float32 GeoTIFF.
///
/// NaN and nodata cells are written as [`NODATA_SENTINEL`] and the
/// sentinel is recorded in the `GDAL_NODATA` tag. An existing file at
/// `path` is overwritten.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(file).map_err(|e| Error::tiff(e))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                NODATA_SENTINEL
            } else {
                num_traits::cast(v).unwrap_or(NODATA_SENTINEL)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::tiff(format!("cannot create image: {}", e)))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(TAG_MODEL_PIXEL_SCALE, scale.as_slice())
        .map_err(|e| Error::tiff(format!("cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(TAG_MODEL_TIEPOINT, tiepoint.as_slice())
        .map_err(|e| Error::tiff(format!("cannot write tiepoint tag: {}", e)))?;

    image
        .encoder()
        .write_tag(
            TAG_GEO_KEY_DIRECTORY,
            geokey_directory(raster.crs()).as_slice(),
        )
        .map_err(|e| Error::tiff(format!("cannot write geokey tag: {}", e)))?;

    image
        .encoder()
        .write_tag(
            TAG_GDAL_NODATA,
            format!("{}", NODATA_SENTINEL).as_str(),
        )
        .map_err(|e| Error::tiff(format!("cannot write nodata tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::tiff(format!("cannot write image data: {}", e)))?;

    Ok(())
}

/// Minimal GeoKey directory: model/raster type plus the EPSG code when
/// the CRS carries one
fn geokey_directory(crs: Option<&Crs>) -> Vec<u16> {
    let epsg = crs.and_then(|c| c.epsg());

    match epsg {
        Some(4326) => vec![
            1, 1, 0, 3, // version 1.1.0, 3 keys
            KEY_GT_MODEL_TYPE, 0, 1, 2, // geographic
            KEY_GT_RASTER_TYPE, 0, 1, 1, // pixel-is-area
            KEY_GEOGRAPHIC_TYPE, 0, 1, 4326,
        ],
        Some(code) if code <= u16::MAX as u32 => vec![
            1, 1, 0, 3,
            KEY_GT_MODEL_TYPE, 0, 1, 1, // projected
            KEY_GT_RASTER_TYPE, 0, 1, 1,
            KEY_PROJECTED_CS_TYPE, 0, 1, code as u16,
        ],
        _ => vec![
            1, 1, 0, 2,
            KEY_GT_MODEL_TYPE, 0, 1, 1,
            KEY_GT_RASTER_TYPE, 0, 1, 1,
        ],
    }
}
