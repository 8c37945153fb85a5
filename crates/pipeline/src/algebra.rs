//! Elementwise raster algebra.
//!
//! Every operation here follows one nodata rule: nodata in any operand
//! produces nodata in the result. Rasters combined cell-by-cell must
//! share grid geometry; the caller regrids first (see
//! [`crate::resample`]) when they do not.

use crate::error::Result;
use crate::maybe_rayon::*;
use calura_core::{Error as CoreError, Raster, RasterElement};
use ndarray::Array2;

/// Apply a unary function to every valid cell. NaN cells stay NaN.
pub fn map<F>(raster: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let val = unsafe { raster.get_unchecked(row, col) };
                if val.is_nodata(nodata) {
                    continue;
                }
                row_data[col] = f(val);
            }
            row_data
        })
        .collect();

    build_output(raster, rows, cols, data)
}

/// Combine two rasters cell-by-cell. Nodata in either input produces
/// nodata in the output.
pub fn zip_with<F>(a: &Raster<f64>, b: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    check_geometry(a, b)?;

    let (rows, cols) = a.shape();
    let nodata_a = a.nodata();
    let nodata_b = b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let va = unsafe { a.get_unchecked(row, col) };
                let vb = unsafe { b.get_unchecked(row, col) };
                if va.is_nodata(nodata_a) || vb.is_nodata(nodata_b) {
                    continue;
                }
                row_data[col] = f(va, vb);
            }
            row_data
        })
        .collect();

    build_output(a, rows, cols, data)
}

/// Keep values where the mask is set, nodata elsewhere
pub fn apply_mask(values: &Raster<f64>, mask: &Raster<u8>) -> Result<Raster<f64>> {
    check_geometry(values, mask)?;

    let (rows, cols) = values.shape();
    let nodata = values.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                if unsafe { mask.get_unchecked(row, col) } == 0 {
                    continue;
                }
                let val = unsafe { values.get_unchecked(row, col) };
                if val.is_nodata(nodata) {
                    continue;
                }
                row_data[col] = val;
            }
            row_data
        })
        .collect();

    build_output(values, rows, cols, data)
}

/// Cells set in `a` but not in `b`
pub fn mask_difference(a: &Raster<u8>, b: &Raster<u8>) -> Result<Raster<u8>> {
    check_geometry(a, b)?;

    let mut out = a.clone();
    for (va, &vb) in out.data_mut().iter_mut().zip(b.data().iter()) {
        if vb != 0 {
            *va = 0;
        }
    }
    Ok(out)
}

/// Number of set cells in a mask
pub fn mask_count(mask: &Raster<u8>) -> usize {
    mask.data().iter().filter(|&&v| v != 0).count()
}

/// Mean of the valid cells of `values` under the mask; `None` when the
/// masked selection holds no valid cell
pub fn masked_mean(values: &Raster<f64>, mask: &Raster<u8>) -> Result<Option<f64>> {
    check_geometry(values, mask)?;

    let nodata = values.nodata();
    let mut sum = 0.0;
    let mut count = 0usize;

    for (&v, &m) in values.data().iter().zip(mask.data().iter()) {
        if m == 0 || v.is_nodata(nodata) {
            continue;
        }
        sum += v;
        count += 1;
    }

    Ok(if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    })
}

/// Min and max over valid cells; `None` for an all-nodata raster
pub fn min_max(values: &Raster<f64>) -> Option<(f64, f64)> {
    let nodata = values.nodata();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut any = false;

    for &v in values.data().iter() {
        if v.is_nodata(nodata) {
            continue;
        }
        min = min.min(v);
        max = max.max(v);
        any = true;
    }

    if any {
        Some((min, max))
    } else {
        None
    }
}

/// Merge rasters cell-by-cell, keeping the first non-nodata value.
///
/// Elevation bands partition by altitude, so inputs rarely overlap;
/// when they coincidentally do, the earliest raster in the slice wins.
pub fn merge_first(rasters: &[Raster<f64>]) -> Result<Raster<f64>> {
    let first = rasters
        .first()
        .ok_or_else(|| CoreError::Other("cannot merge an empty raster list".to_string()))?;
    for other in &rasters[1..] {
        check_geometry(first, other)?;
    }

    let (rows, cols) = first.shape();
    let mut out = first.like_filled(f64::NAN);
    out.set_nodata(Some(f64::NAN));

    for raster in rasters {
        let nodata = raster.nodata();
        for row in 0..rows {
            for col in 0..cols {
                let current = unsafe { out.get_unchecked(row, col) };
                if !current.is_nan() {
                    continue;
                }
                let v = unsafe { raster.get_unchecked(row, col) };
                if !v.is_nodata(nodata) {
                    unsafe { out.set_unchecked(row, col, v) };
                }
            }
        }
    }

    Ok(out)
}

/// Clamp every valid cell into `[lo, hi]`
pub fn clamp(raster: &Raster<f64>, lo: f64, hi: f64) -> Result<Raster<f64>> {
    map(raster, |v| v.clamp(lo, hi))
}

fn check_geometry<A, B>(a: &Raster<A>, b: &Raster<B>) -> Result<()>
where
    A: RasterElement,
    B: RasterElement,
{
    let ga = a.geometry();
    let gb = b.geometry();
    if !ga.matches(&gb) {
        return Err(CoreError::GridMismatch(format!(
            "{} vs {}",
            ga.describe(),
            gb.describe()
        ))
        .into());
    }
    Ok(())
}

fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.like_filled(f64::NAN);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| CoreError::Other(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calura_core::GeoTransform;

    fn band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64 * 30.0, 30.0, -30.0));
        r
    }

    fn mask(template: &Raster<f64>, set: &[(usize, usize)]) -> Raster<u8> {
        let mut m = template.like_filled(0u8);
        for &(row, col) in set {
            m.set(row, col, 1).unwrap();
        }
        m
    }

    #[test]
    fn test_map_preserves_nan() {
        let mut r = band(3, 3, 10.0);
        r.set(1, 1, f64::NAN).unwrap();

        let out = map(&r, |v| v * 2.0).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 20.0);
        assert!(out.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_zip_with_nodata_propagation() {
        let a = band(3, 3, 25.0);
        let mut b = band(3, 3, 20.0);
        b.set(2, 2, f64::NAN).unwrap();

        let diff = zip_with(&a, &b, |x, y| x - y).unwrap();
        assert_eq!(diff.get(0, 0).unwrap(), 5.0);
        assert!(diff.get(2, 2).unwrap().is_nan());
    }

    #[test]
    fn test_zip_with_geometry_mismatch() {
        let a = band(3, 3, 1.0);
        let b = band(4, 4, 1.0);
        assert!(zip_with(&a, &b, |x, _| x).is_err());
    }

    #[test]
    fn test_apply_mask() {
        let r = band(3, 3, 21.5);
        let m = mask(&r, &[(0, 0), (1, 2)]);

        let out = apply_mask(&r, &m).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 21.5);
        assert_eq!(out.get(1, 2).unwrap(), 21.5);
        assert!(out.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_mask_difference_disjoint() {
        let template = band(3, 3, 0.0);
        let a = mask(&template, &[(0, 0), (0, 1), (1, 1)]);
        let b = mask(&template, &[(0, 1)]);

        let out = mask_difference(&a, &b).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 1);
        assert_eq!(out.get(0, 1).unwrap(), 0);
        assert_eq!(out.get(1, 1).unwrap(), 1);
        assert_eq!(mask_count(&out), 2);
    }

    #[test]
    fn test_masked_mean_skips_nan() {
        let mut r = band(2, 2, 10.0);
        r.set(0, 1, 30.0).unwrap();
        r.set(1, 0, f64::NAN).unwrap();
        let m = mask(&r, &[(0, 0), (0, 1), (1, 0)]);

        let mean = masked_mean(&r, &m).unwrap();
        assert_eq!(mean, Some(20.0));
    }

    #[test]
    fn test_masked_mean_empty_selection() {
        let r = band(2, 2, 10.0);
        let m = r.like_filled(0u8);
        assert_eq!(masked_mean(&r, &m).unwrap(), None);
    }

    #[test]
    fn test_merge_first_prefers_earlier() {
        let mut a = band(2, 2, f64::NAN);
        a.set(0, 0, 1.0).unwrap();
        a.set(0, 1, 2.0).unwrap();
        let mut b = band(2, 2, f64::NAN);
        b.set(0, 1, 99.0).unwrap();
        b.set(1, 0, 3.0).unwrap();

        let merged = merge_first(&[a, b]).unwrap();
        assert_eq!(merged.get(0, 0).unwrap(), 1.0);
        assert_eq!(merged.get(0, 1).unwrap(), 2.0);
        assert_eq!(merged.get(1, 0).unwrap(), 3.0);
        assert!(merged.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_clamp_bounds() {
        let mut r = band(2, 2, 0.5);
        r.set(0, 0, -0.1).unwrap();
        r.set(0, 1, 1.3).unwrap();

        let out = clamp(&r, 0.0, 1.0).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 0.0);
        assert_eq!(out.get(0, 1).unwrap(), 1.0);
        assert_eq!(out.get(1, 1).unwrap(), 0.5);
    }
}
