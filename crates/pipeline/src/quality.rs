//! Per-scene quality filtering.
//!
//! Turns one raw scene into a validated LST raster in degrees Celsius,
//! or skips it: out-of-range acquisition dates and scenes with more
//! than 70% invalid cells are skipped with a reported reason, never
//! treated as errors.

use crate::algebra;
use crate::error::Result;
use crate::maybe_rayon::*;
use crate::scene::{DateRange, SceneThermalObservation, SensorFamily};
use calura_core::{Error as CoreError, Raster, RasterElement};
use chrono::NaiveDate;
use ndarray::Array2;
use std::fmt;
use tracing::debug;

/// Collection-2 surface-temperature scale factor
pub const DN_SCALE: f64 = 0.00341802;
/// Collection-2 surface-temperature offset (Kelvin)
pub const DN_OFFSET: f64 = 149.0;
/// Kelvin to Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

/// A scene with more than this fraction of invalid cells is skipped.
/// Exactly at the threshold is accepted.
pub const MAX_INVALID_FRACTION: f64 = 0.70;

/// Window size of the destriping mean filter (cells per side)
pub const DESTRIPE_WINDOW: usize = 11;

/// ETM+ scan-line corrector failure; later ETM+ scenes carry stripes of
/// missing cells and get the destriping pass
const SLC_FAILURE: (i32, u32, u32) = (2003, 5, 31);

/// Why a scene was skipped
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Acquired outside the requested date range
    OutOfDateRange,
    /// Invalid-cell fraction above [`MAX_INVALID_FRACTION`]
    MostlyInvalid { fraction: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OutOfDateRange => write!(f, "acquired outside the target date range"),
            SkipReason::MostlyInvalid { fraction } => {
                write!(f, "{:.1}% of cells invalid", fraction * 100.0)
            }
        }
    }
}

/// Outcome of filtering one scene
#[derive(Debug, Clone)]
pub enum SceneOutcome {
    /// Validated LST raster in degrees Celsius
    Accepted(Raster<f64>),
    Skipped(SkipReason),
}

/// Run the full quality filter on one scene.
///
/// Steps: date check, clear-sky validity mask from the QA raster,
/// DN → Celsius conversion, destriping for post-SLC-failure ETM+
/// scenes, mask application, invalid-fraction check.
pub fn filter_scene(
    scene: &SceneThermalObservation,
    range: &DateRange,
) -> Result<SceneOutcome> {
    if !range.contains(scene.acquired) {
        return Ok(SceneOutcome::Skipped(SkipReason::OutOfDateRange));
    }

    let validity = validity_mask(&scene.qa, scene.family.clear_sky_code());
    let mut lst = dn_to_celsius(&scene.thermal)?;

    if needs_destriping(scene.family, scene.acquired) {
        debug!(scene = %scene.scene_id, "applying destriping fill");
        lst = fill_gaps(&lst, DESTRIPE_WINDOW)?;
    }

    let lst = algebra::apply_mask(&lst, &validity)?;

    // Counted directly so a scene at exactly the threshold compares
    // equal to it instead of picking up rounding from 1.0 - fraction
    let invalid_cells = lst.len() - lst.valid_count();
    let invalid_fraction = invalid_cells as f64 / lst.len() as f64;
    if invalid_fraction > MAX_INVALID_FRACTION {
        return Ok(SceneOutcome::Skipped(SkipReason::MostlyInvalid {
            fraction: invalid_fraction,
        }));
    }

    Ok(SceneOutcome::Accepted(lst))
}

/// Boolean mask of cells whose QA code equals the clear-sky code exactly
pub fn validity_mask(qa: &Raster<u16>, clear_code: u16) -> Raster<u8> {
    let mut mask = qa.like_filled(0u8);
    for (out, &code) in mask.data_mut().iter_mut().zip(qa.data().iter()) {
        if code == clear_code {
            *out = 1;
        }
    }
    mask
}

/// Convert surface-temperature digital numbers to degrees Celsius.
///
/// `lst = dn * 0.00341802 + 149.0 - 273.15`, the Collection-2 Level-2
/// scaling. Scene-independent; nodata propagates.
pub fn dn_to_celsius(dn: &Raster<f64>) -> Result<Raster<f64>> {
    algebra::map(dn, |v| v * DN_SCALE + DN_OFFSET - KELVIN_OFFSET)
}

fn needs_destriping(family: SensorFamily, acquired: NaiveDate) -> bool {
    let (y, m, d) = SLC_FAILURE;
    family == SensorFamily::EtmPlus && acquired > NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fill nodata cells with the mean of valid neighbours in a square
/// window. Valid cells pass through untouched; a nodata cell with no
/// valid neighbour stays nodata.
pub fn fill_gaps(raster: &Raster<f64>, window: usize) -> Result<Raster<f64>> {
    if window % 2 == 0 || window < 3 {
        return Err(CoreError::Other(format!(
            "gap-fill window must be odd and >= 3, got {}",
            window
        ))
        .into());
    }

    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();
    let half = (window / 2) as isize;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { raster.get_unchecked(row, col) };
                if !center.is_nodata(nodata) {
                    *out = center;
                    continue;
                }

                let mut sum = 0.0;
                let mut count = 0usize;
                for dr in -half..=half {
                    for dc in -half..=half {
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                            continue;
                        }
                        let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                        if !v.is_nodata(nodata) {
                            sum += v;
                            count += 1;
                        }
                    }
                }

                if count > 0 {
                    *out = sum / count as f64;
                }
            }

            row_data
        })
        .collect();

    let mut output = raster.like_filled(f64::NAN);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| CoreError::Other(e.to_string()))?;

    Ok(output)
}
