//! Per-band thermal anomaly and normalized SUHI index.
//!
//! For every elevation band: the rural reference temperature, the
//! per-cell anomaly against it, and a min/max normalization of the
//! band's LST into `[0, 1]`. Band rasters merge into whole-area outputs
//! at the end; bands partition by altitude, so the merge only has to
//! tolerate coincidental overlap.

use crate::algebra::{
    apply_mask, clamp, map, mask_count, mask_difference, masked_mean, merge_first, min_max,
};
use crate::elevation::{BandLayout, ElevationBand};
use crate::error::{Error, Result};
use crate::landcover::LandCoverMasks;
use calura_core::{Raster, RasterElement};
use tracing::{info, warn};

/// Outputs and statistics for one elevation band
#[derive(Debug, Clone)]
pub struct BandResult {
    pub band: ElevationBand,
    pub mean_urban: f64,
    pub mean_rural: f64,
    pub band_min: f64,
    pub band_max: f64,
    /// True when `band_max == band_min` and SUHI is all-nodata
    pub degenerate: bool,
    pub anomaly: Raster<f64>,
    pub suhi: Raster<f64>,
}

/// Whole-area outputs plus the per-band breakdown
#[derive(Debug, Clone)]
pub struct SuhiOutputs {
    pub bands: Vec<BandResult>,
    pub anomaly: Raster<f64>,
    pub suhi: Raster<f64>,
}

/// Compute anomaly and SUHI rasters for every band and merge them.
///
/// Fatal when the urban or rural mask is empty for the study area or
/// for any band: without a reference temperature the outputs would be
/// silently meaningless.
pub fn compute(
    lst: &Raster<f64>,
    dem: &Raster<f64>,
    masks: &LandCoverMasks,
    layout: &BandLayout,
    boundary: &Raster<u8>,
) -> Result<SuhiOutputs> {
    if mask_count(&masks.urban) == 0 {
        return Err(Error::EmptyReferenceArea(
            "urban mask has no cells for the study area".to_string(),
        ));
    }
    if mask_count(&masks.rural) == 0 {
        return Err(Error::EmptyReferenceArea(
            "rural-reference mask has no cells for the study area".to_string(),
        ));
    }

    let mut bands = Vec::new();
    for band in layout.bands() {
        let result = compute_band(lst, dem, band, masks, boundary)?;
        info!(
            band = %result.band,
            mean_urban = result.mean_urban,
            mean_rural = result.mean_rural,
            "band computed"
        );
        bands.push(result);
    }

    let (anomaly, suhi) = match layout {
        BandLayout::Single(_) => {
            // Single-band path: the band rasters are the whole-area
            // outputs, no merge involved
            (bands[0].anomaly.clone(), bands[0].suhi.clone())
        }
        BandLayout::Banded(_) => {
            let anomalies: Vec<_> = bands.iter().map(|b| b.anomaly.clone()).collect();
            let suhis: Vec<_> = bands.iter().map(|b| b.suhi.clone()).collect();
            (merge_first(&anomalies)?, merge_first(&suhis)?)
        }
    };

    let suhi = clamp(&suhi, 0.0, 1.0)?;

    Ok(SuhiOutputs {
        bands,
        anomaly,
        suhi,
    })
}

/// Anomaly and SUHI for one elevation band
fn compute_band(
    lst: &Raster<f64>,
    dem: &Raster<f64>,
    band: ElevationBand,
    masks: &LandCoverMasks,
    boundary: &Raster<u8>,
) -> Result<BandResult> {
    let footprint = band_footprint(dem, band);
    let band_lst = apply_mask(lst, &footprint)?;

    let mean_urban = masked_mean(&band_lst, &masks.urban)?.ok_or_else(|| {
        Error::EmptyReferenceArea(format!("no valid urban LST cell in band {}", band))
    })?;

    // Masks are built disjoint; re-exclude urban cells anyway so the
    // reference mean can never mix in built-up temperatures
    let rural = mask_difference(&masks.rural, &masks.urban)?;
    let mean_rural = masked_mean(&band_lst, &rural)?.ok_or_else(|| {
        Error::EmptyReferenceArea(format!("no valid rural LST cell in band {}", band))
    })?;

    let anomaly = map(&band_lst, |v| v - mean_rural)?;
    let anomaly = apply_mask(&anomaly, boundary)?;

    // Normalization bounds come from the whole band footprint, not just
    // the urban part
    let (band_min, band_max) = min_max(&band_lst).ok_or_else(|| {
        Error::EmptyReferenceArea(format!("no valid LST cell in band {}", band))
    })?;

    let degenerate = band_max - band_min < f64::EPSILON;
    let suhi = if degenerate {
        warn!(band = %band, "degenerate LST range, emitting nodata SUHI for this band");
        let mut empty = band_lst.like_filled(f64::NAN);
        empty.set_nodata(Some(f64::NAN));
        empty
    } else {
        let normalized = map(&band_lst, |v| (v - band_min) / (band_max - band_min))?;
        apply_mask(&normalized, boundary)?
    };

    Ok(BandResult {
        band,
        mean_urban,
        mean_rural,
        band_min,
        band_max,
        degenerate,
        anomaly,
        suhi,
    })
}

/// Cells whose elevation falls inside the band
fn band_footprint(dem: &Raster<f64>, band: ElevationBand) -> Raster<u8> {
    let nodata = dem.nodata();
    let mut footprint = dem.like_filled(0u8);

    for (out, &alt) in footprint.data_mut().iter_mut().zip(dem.data().iter()) {
        if !alt.is_nodata(nodata) && band.contains(alt) {
            *out = 1;
        }
    }

    footprint
}
