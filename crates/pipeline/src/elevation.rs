//! Elevation band partitioning.
//!
//! Splits the urbanized altitude range into fixed-height bands so the
//! anomaly stage can compare urban and rural temperatures at comparable
//! altitudes. Band arithmetic is pinned: the first lower bound is the
//! urban minimum rounded down to the nearest 10, the band count is the
//! urban range rounded to the nearest 10, divided by the band height
//! and truncated. The top of the range may end up partially uncovered;
//! that boundary behaviour is deliberate and tested.

use crate::algebra::apply_mask;
use crate::error::{Error, Result};
use calura_core::Raster;
use std::fmt;
use tracing::info;

/// Fixed band height in map units
pub const BAND_HEIGHT: f64 = 100.0;

/// One altitude interval.
///
/// Bands from a multi-band partition are half-open `[lower, upper)`;
/// the single-band fallback is closed on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationBand {
    pub lower: f64,
    pub upper: f64,
    pub inclusive_upper: bool,
}

impl ElevationBand {
    /// Half-open band `[lower, lower + BAND_HEIGHT)`
    pub fn half_open(lower: f64) -> Self {
        Self {
            lower,
            upper: lower + BAND_HEIGHT,
            inclusive_upper: false,
        }
    }

    /// Closed band centred on the mean urban altitude
    pub fn around_mean(mean: f64) -> Self {
        Self {
            lower: mean - BAND_HEIGHT / 2.0,
            upper: mean + BAND_HEIGHT / 2.0,
            inclusive_upper: true,
        }
    }

    pub fn contains(&self, altitude: f64) -> bool {
        if altitude < self.lower {
            return false;
        }
        if self.inclusive_upper {
            altitude <= self.upper
        } else {
            altitude < self.upper
        }
    }
}

impl fmt::Display for ElevationBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let close = if self.inclusive_upper { "]" } else { ")" };
        write!(f, "[{:.0}, {:.0}{} m", self.lower, self.upper, close)
    }
}

/// Result of partitioning the urban altitude range
#[derive(Debug, Clone, PartialEq)]
pub enum BandLayout {
    /// Consecutive half-open bands covering the urban range
    Banded(Vec<ElevationBand>),
    /// Range too narrow for bands: one closed interval around the mean
    Single(ElevationBand),
}

impl BandLayout {
    /// Bands in ascending order; one element for the single-band case
    pub fn bands(&self) -> Vec<ElevationBand> {
        match self {
            BandLayout::Banded(bands) => bands.clone(),
            BandLayout::Single(band) => vec![*band],
        }
    }

    pub fn band_count(&self) -> usize {
        match self {
            BandLayout::Banded(bands) => bands.len(),
            BandLayout::Single(_) => 1,
        }
    }
}

/// Partition the urban altitude range into elevation bands.
///
/// The DEM must already share the working grid. Altitude statistics are
/// taken over urban cells only, each rounded to the nearest integer.
pub fn partition(dem: &Raster<f64>, urban_mask: &Raster<u8>) -> Result<BandLayout> {
    let urban_dem = apply_mask(dem, urban_mask)?;
    let stats = urban_dem.statistics();

    let (min, max, mean) = match (stats.min, stats.max, stats.mean) {
        (Some(min), Some(max), Some(mean)) => (min.round(), max.round(), mean.round()),
        _ => {
            return Err(Error::EmptyReferenceArea(
                "urban mask covers no cell with elevation data".to_string(),
            ))
        }
    };

    let lower0 = round_down_10(min);
    let range = max - lower0;
    let band_count = (round_nearest_10(range) / BAND_HEIGHT).trunc() as usize;

    if band_count <= 1 {
        let band = ElevationBand::around_mean(mean);
        info!(band = %band, "urban altitude range under one band height, using mean-centred band");
        return Ok(BandLayout::Single(band));
    }

    let bands = (0..band_count)
        .map(|i| ElevationBand::half_open(lower0 + i as f64 * BAND_HEIGHT))
        .collect::<Vec<_>>();

    info!(
        count = band_count,
        min = min,
        max = max,
        "urban area partitioned into elevation bands"
    );

    Ok(BandLayout::Banded(bands))
}

fn round_down_10(value: f64) -> f64 {
    (value / 10.0).floor() * 10.0
}

fn round_nearest_10(value: f64) -> f64 {
    (value / 10.0).round() * 10.0
}
