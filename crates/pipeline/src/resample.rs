//! Nearest-neighbour regridding between input grids.
//!
//! Every joint pipeline stage requires identical grid geometry; this
//! module reconciles mismatches explicitly. CRS differences are handled
//! for the pairs that actually occur with Landsat work — WGS84
//! geographic against UTM (EPSG 326xx/327xx) — using Snyder's USGS
//! formulas, so no C projection library is required. Any other CRS pair
//! is a fatal error rather than a silent guess.

use crate::error::{Error, Result};
use crate::maybe_rayon::*;
use calura_core::{Crs, Error as CoreError, GridGeometry, Raster, RasterElement};
use ndarray::Array2;
use tracing::debug;

// WGS84 ellipsoid
const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const E2: f64 = 2.0 * F - F * F;
const E_PRIME2: f64 = E2 / (1.0 - E2);
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Resample a raster onto the target grid by nearest neighbour.
///
/// Target cells outside the source's coverage become nodata. When
/// source and target CRS differ, each target cell centre is transformed
/// into the source CRS before sampling.
pub fn regrid_nearest(src: &Raster<f64>, target: &GridGeometry) -> Result<Raster<f64>> {
    if src.geometry().matches(target) {
        return Ok(src.clone());
    }

    let transform = point_transform(target.crs.as_ref(), src.crs())?;
    debug!(
        from = %target.crs.as_ref().map(|c| c.identifier()).unwrap_or_default(),
        to = %src.crs().map(|c| c.identifier()).unwrap_or_default(),
        "regridding to target geometry"
    );

    let (src_rows, src_cols) = src.shape();
    let nodata = src.nodata();
    let rows = target.rows;
    let cols = target.cols;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let (x, y) = target.transform.pixel_to_geo(col, row);
                let (sx, sy) = transform.apply(x, y);
                let (fc, fr) = src.geo_to_pixel(sx, sy);

                let sc = fc.floor();
                let sr = fr.floor();
                if sc < 0.0 || sr < 0.0 || sc >= src_cols as f64 || sr >= src_rows as f64 {
                    continue;
                }

                let v = unsafe { src.get_unchecked(sr as usize, sc as usize) };
                if !v.is_nodata(nodata) {
                    *out = v;
                }
            }

            row_data
        })
        .collect();

    let mut output: Raster<f64> = Raster::new(rows, cols);
    output.set_transform(target.transform);
    output.set_crs(target.crs.clone());
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| CoreError::Other(e.to_string()))?;

    Ok(output)
}

/// Point transform from one CRS into another
enum PointTransform {
    Identity,
    Wgs84ToUtm { zone: u32, north: bool },
    UtmToWgs84 { zone: u32, north: bool },
}

impl PointTransform {
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            PointTransform::Identity => (x, y),
            PointTransform::Wgs84ToUtm { zone, north } => wgs84_to_utm(x, y, zone, north),
            PointTransform::UtmToWgs84 { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }
}

fn point_transform(from: Option<&Crs>, to: Option<&Crs>) -> Result<PointTransform> {
    let (from_epsg, to_epsg) = match (from.and_then(|c| c.epsg()), to.and_then(|c| c.epsg())) {
        // Unknown CRS on either side: assume coordinates already agree
        (None, _) | (_, None) => return Ok(PointTransform::Identity),
        (Some(a), Some(b)) => (a, b),
    };

    if from_epsg == to_epsg {
        return Ok(PointTransform::Identity);
    }

    match (from_epsg, parse_utm_epsg(to_epsg)) {
        (4326, Some((zone, north))) => return Ok(PointTransform::Wgs84ToUtm { zone, north }),
        _ => {}
    }
    if let (Some((zone, north)), 4326) = (parse_utm_epsg(from_epsg), to_epsg) {
        return Ok(PointTransform::UtmToWgs84 { zone, north });
    }

    Err(Error::UnsupportedReprojection {
        src: format!("EPSG:{}", from_epsg),
        dst: format!("EPSG:{}", to_epsg),
    })
}

/// `Some((zone, is_north))` for UTM EPSG codes, `None` otherwise
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Meridional arc length (Snyder eq. 3-21)
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

/// WGS84 (lon, lat) in degrees to UTM (easting, northing) in metres
/// (Snyder 1987, USGS Prof. Paper 1395, eqs. 8-9..8-13)
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);

    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a3 = a2 * a_coeff;
    let a4 = a2 * a2;
    let a5 = a4 * a_coeff;
    let a6 = a4 * a2;

    let easting = K0
        * n
        * (a_coeff
            + (1.0 - t + c) * a3 / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a5 / 120.0)
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    if !north {
        northing += FALSE_NORTHING_SOUTH;
    }

    (easting, northing)
}

/// UTM (easting, northing) in metres to WGS84 (lon, lat) in degrees
/// (Snyder 1987, eqs. 8-17..8-25)
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * E2 * E2 / 64.0 - 5.0 * E2 * E2 * E2 / 256.0));

    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_2 * e1_2;

    // Footprint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let n1 = A / (1.0 - E2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = A * (1.0 - E2) / (1.0 - E2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d2 * d2;
    let d5 = d4 * d;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d5
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use calura_core::GeoTransform;

    #[test]
    fn test_identity_regrid_is_clone() {
        let mut src = Raster::filled(4, 4, 7.5);
        src.set_transform(GeoTransform::new(0.0, 120.0, 30.0, -30.0));
        src.set_crs(Some(Crs::utm(32, true)));

        let out = regrid_nearest(&src, &src.geometry()).unwrap();
        assert_eq!(out.get(2, 2).unwrap(), 7.5);
    }

    #[test]
    fn test_nearest_downsampling() {
        // 4x4 at 30 m; each cell carries its row index
        let mut src = Raster::new(4, 4);
        src.set_transform(GeoTransform::new(0.0, 120.0, 30.0, -30.0));
        for row in 0..4 {
            for col in 0..4 {
                src.set(row, col, row as f64).unwrap();
            }
        }

        // 2x2 at 60 m over the same extent: centres fall in rows 1, 3
        let target = GridGeometry {
            rows: 2,
            cols: 2,
            transform: GeoTransform::new(0.0, 120.0, 60.0, -60.0),
            crs: None,
        };

        let out = regrid_nearest(&src, &target).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_eq!(out.get(1, 1).unwrap(), 3.0);
    }

    #[test]
    fn test_outside_coverage_is_nodata() {
        let mut src = Raster::filled(2, 2, 5.0);
        src.set_transform(GeoTransform::new(0.0, 60.0, 30.0, -30.0));

        // Target extends beyond the source on all sides
        let target = GridGeometry {
            rows: 4,
            cols: 4,
            transform: GeoTransform::new(-60.0, 120.0, 30.0, -30.0),
            crs: None,
        };

        let out = regrid_nearest(&src, &target).unwrap();
        assert!(out.get(0, 0).unwrap().is_nan());
        assert_eq!(out.get(2, 2).unwrap(), 5.0);
    }

    #[test]
    fn test_unsupported_crs_pair_rejected() {
        let mut src = Raster::filled(2, 2, 5.0);
        src.set_transform(GeoTransform::new(0.0, 60.0, 30.0, -30.0));
        src.set_crs(Some(Crs::from_epsg(3857)));

        let target = GridGeometry {
            rows: 2,
            cols: 2,
            transform: GeoTransform::new(0.0, 60.0, 30.0, -30.0),
            crs: Some(Crs::utm(32, true)),
        };

        assert!(matches!(
            regrid_nearest(&src, &target),
            Err(Error::UnsupportedReprojection { .. })
        ));
    }

    #[test]
    fn test_utm_central_meridian() {
        // On the central meridian of zone 32 (9°E) the easting is the
        // false easting exactly
        let (e, n) = wgs84_to_utm(9.0, 45.0, 32, true);
        assert_relative_eq!(e, 500_000.0, epsilon = 1e-6);
        assert!(n > 4_900_000.0 && n < 5_050_000.0);
    }

    #[test]
    fn test_utm_roundtrip() {
        let points = [(11.34, 44.49), (9.19, 45.46), (7.68, 45.07)];
        for &(lon, lat) in &points {
            let (e, n) = wgs84_to_utm(lon, lat, 32, true);
            let (lon2, lat2) = utm_to_wgs84(e, n, 32, true);
            assert_relative_eq!(lon, lon2, epsilon = 1e-7);
            assert_relative_eq!(lat, lat2, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_utm_south_roundtrip() {
        let (e, n) = wgs84_to_utm(-70.66, -33.45, 19, false);
        assert!(n > 0.0, "southern hemisphere northing must stay positive");
        let (lon, lat) = utm_to_wgs84(e, n, 19, false);
        assert_relative_eq!(lon, -70.66, epsilon = 1e-7);
        assert_relative_eq!(lat, -33.45, epsilon = 1e-7);
    }

    #[test]
    fn test_parse_utm_epsg() {
        assert_eq!(parse_utm_epsg(32632), Some((32, true)));
        assert_eq!(parse_utm_epsg(32719), Some((19, false)));
        assert_eq!(parse_utm_epsg(4326), None);
        assert_eq!(parse_utm_epsg(3857), None);
    }
}
