//! Seasonal compositing of accepted scenes.
//!
//! Cell-wise arithmetic mean over any number of per-scene LST rasters,
//! with nodata ignored independently per cell. The reduction is
//! commutative and associative, so scene order never changes the
//! result.

use crate::error::{Error, Result};
use crate::maybe_rayon::*;
use calura_core::{Error as CoreError, Raster, RasterElement};
use ndarray::Array2;

/// Reduce accepted per-scene LST rasters into one mean-seasonal raster.
///
/// An output cell is nodata only when it is nodata in every input
/// scene. All inputs must share grid geometry.
pub fn seasonal_mean(scenes: &[Raster<f64>]) -> Result<Raster<f64>> {
    let first = scenes.first().ok_or(Error::EmptyComposite)?;
    let reference = first.geometry();

    for scene in &scenes[1..] {
        let geometry = scene.geometry();
        if !reference.matches(&geometry) {
            return Err(CoreError::GridMismatch(format!(
                "composite input {} vs {}",
                reference.describe(),
                geometry.describe()
            ))
            .into());
        }
    }

    let (rows, cols) = first.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut count = 0usize;

                for scene in scenes {
                    let v = unsafe { scene.get_unchecked(row, col) };
                    if v.is_nodata(scene.nodata()) {
                        continue;
                    }
                    sum += v;
                    count += 1;
                }

                if count > 0 {
                    *out = sum / count as f64;
                }
            }

            row_data
        })
        .collect();

    let mut output = first.like_filled(f64::NAN);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| CoreError::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use calura_core::GeoTransform;

    fn lst(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(5, 5, value);
        r.set_transform(GeoTransform::new(0.0, 150.0, 30.0, -30.0));
        r
    }

    #[test]
    fn test_mean_of_two_scenes() {
        let composite = seasonal_mean(&[lst(20.0), lst(30.0)]).unwrap();
        assert_relative_eq!(composite.get(2, 2).unwrap(), 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nodata_ignored_per_cell() {
        let a = lst(20.0);
        let mut b = lst(30.0);
        b.set(1, 1, f64::NAN).unwrap();

        let composite = seasonal_mean(&[a, b]).unwrap();
        // Where both scenes are valid: mean of both
        assert_relative_eq!(composite.get(0, 0).unwrap(), 25.0, epsilon = 1e-12);
        // Where only one scene is valid: that scene's value
        assert_relative_eq!(composite.get(1, 1).unwrap(), 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_nodata_cell_stays_nodata() {
        let mut a = lst(20.0);
        let mut b = lst(30.0);
        a.set(3, 3, f64::NAN).unwrap();
        b.set(3, 3, f64::NAN).unwrap();

        let composite = seasonal_mean(&[a, b]).unwrap();
        assert!(composite.get(3, 3).unwrap().is_nan());
    }

    #[test]
    fn test_order_independent() {
        let mut a = lst(18.0);
        a.set(0, 0, f64::NAN).unwrap();
        let b = lst(24.0);
        let c = lst(33.0);

        let forward = seasonal_mean(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = seasonal_mean(&[c, b, a]).unwrap();

        for row in 0..5 {
            for col in 0..5 {
                let f = forward.get(row, col).unwrap();
                let r = backward.get(row, col).unwrap();
                assert_relative_eq!(f, r, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            seasonal_mean(&[]),
            Err(Error::EmptyComposite)
        ));
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let a = lst(20.0);
        let mut b = Raster::filled(5, 5, 30.0);
        b.set_transform(GeoTransform::new(90.0, 150.0, 30.0, -30.0));

        assert!(seasonal_mean(&[a, b]).is_err());
    }
}
