//! End-to-end pipeline orchestration.
//!
//! Drives scene filtering, seasonal compositing, mask construction,
//! elevation partitioning and the anomaly/SUHI computation from one
//! parameter set, and writes every output raster. All paths are
//! explicit parameters; nothing depends on the process working
//! directory. Re-running with the same season and year overwrites the
//! previous outputs.

use crate::anomaly;
use crate::composite::seasonal_mean;
use crate::elevation::{partition, BandLayout};
use crate::error::{Error, Result};
use crate::landcover::{build_masks, rasterize, URBAN_BUFFER_DISTANCE};
use crate::quality::{filter_scene, SceneOutcome, SkipReason};
use crate::resample::regrid_nearest;
use crate::scene::{DateRange, SceneCatalog};
use calura_core::io::{read_geojson, read_geotiff, write_geotiff};
use calura_core::{GridGeometry, Raster};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Meteorological season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Date range of this season in the given year.
    ///
    /// Winter of year Y runs from 1 December of Y to the end of
    /// February of Y+1.
    pub fn date_range(&self, year: i32) -> DateRange {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        match self {
            Season::Spring => DateRange::new(ymd(year, 3, 1), ymd(year, 5, 31)),
            Season::Summer => DateRange::new(ymd(year, 6, 1), ymd(year, 8, 31)),
            Season::Autumn => DateRange::new(ymd(year, 9, 1), ymd(year, 11, 30)),
            Season::Winter => DateRange::new(
                ymd(year, 12, 1),
                ymd(year + 1, 3, 1).pred_opt().unwrap(),
            ),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            other => Err(format!("unknown season: {}", other)),
        }
    }
}

/// Everything one pipeline run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Directory holding the scene band files
    pub scene_dir: PathBuf,
    /// Land-cover GeoJSON with classification attributes
    pub landcover_path: PathBuf,
    /// Attribute key carrying the classification tag
    pub category_key: String,
    /// Categories making up the urban footprint
    pub urban_categories: Vec<String>,
    /// Categories making up the rural reference
    pub rural_categories: Vec<String>,
    /// Digital elevation model raster
    pub dem_path: PathBuf,
    /// Study-area boundary GeoJSON
    pub boundary_path: PathBuf,
    pub season: Season,
    pub year: i32,
    /// Overrides the season's date range when set
    pub date_range: Option<DateRange>,
    pub output_dir: PathBuf,
    /// Buffer kept between urban and rural cells, map units
    pub buffer_distance: f64,
}

impl RunParams {
    pub fn effective_range(&self) -> DateRange {
        self.date_range
            .unwrap_or_else(|| self.season.date_range(self.year))
    }
}

/// What a completed run produced
#[derive(Debug)]
pub struct RunSummary {
    pub accepted_scenes: usize,
    pub skipped_scenes: Vec<(String, SkipReason)>,
    pub band_count: usize,
    pub outputs: Vec<PathBuf>,
}

/// Execute the full pipeline
pub fn execute(params: &RunParams) -> Result<RunSummary> {
    let range = params.effective_range();
    info!(season = %params.season, year = params.year, range = %range, "starting run");

    // Scene filtering
    let catalog = SceneCatalog::scan_dir(&params.scene_dir)?;
    info!(scenes = catalog.len(), "scene catalog scanned");

    let mut accepted: Vec<Raster<f64>> = Vec::new();
    let mut skipped: Vec<(String, SkipReason)> = Vec::new();

    for source in &catalog.scenes {
        if !range.contains(source.acquired) {
            skipped.push((source.scene_id.clone(), SkipReason::OutOfDateRange));
            continue;
        }

        let scene = source.load()?;
        match filter_scene(&scene, &range)? {
            SceneOutcome::Accepted(lst) => {
                let lst = match accepted.first() {
                    Some(reference) if !lst.geometry().matches(&reference.geometry()) => {
                        warn!(scene = %source.scene_id, "scene grid differs, regridding");
                        regrid_nearest(&lst, &reference.geometry())?
                    }
                    _ => lst,
                };
                info!(scene = %source.scene_id, "scene accepted");
                accepted.push(lst);
            }
            SceneOutcome::Skipped(reason) => {
                warn!(scene = %source.scene_id, reason = %reason, "scene skipped");
                skipped.push((source.scene_id.clone(), reason));
            }
        }
    }

    if accepted.is_empty() {
        return Err(Error::NoValidScenes {
            start: range.start,
            end: range.end,
        });
    }

    // Seasonal composite
    let composite = seasonal_mean(&accepted)?;
    let geometry = composite.geometry();

    std::fs::create_dir_all(&params.output_dir).map_err(calura_core::Error::Io)?;
    let mut outputs = Vec::new();
    let lst_path = output_path(params, "lst_mean", None);
    write_geotiff(&composite, &lst_path)?;
    outputs.push(lst_path);

    // Land-cover masks, one parameterized build per category list
    let landcover = read_geojson(&params.landcover_path)?;
    let urban_features = landcover.with_categories(&params.category_key, &params.urban_categories);
    let rural_features = landcover.with_categories(&params.category_key, &params.rural_categories);
    info!(
        urban_features = urban_features.len(),
        rural_features = rural_features.len(),
        "land-cover features selected"
    );

    let masks = build_masks(
        &urban_features,
        &rural_features,
        &geometry,
        params.buffer_distance,
    )?;

    // Elevation, regridded onto the composite grid when needed
    let dem: Raster<f64> = read_geotiff(&params.dem_path)?;
    let dem = reconcile(dem, &geometry, "elevation model")?;

    // Study-area boundary
    let boundary_features = read_geojson(&params.boundary_path)?;
    let boundary = rasterize(&boundary_features, &geometry);

    // Bands, anomaly, SUHI
    let layout = partition(&dem, &masks.urban)?;
    let results = anomaly::compute(&composite, &dem, &masks, &layout, &boundary)?;

    if let BandLayout::Banded(_) = layout {
        for (i, band) in results.bands.iter().enumerate() {
            let anomaly_path = output_path(params, "anomaly", Some(i + 1));
            write_geotiff(&band.anomaly, &anomaly_path)?;
            outputs.push(anomaly_path);

            let suhi_path = output_path(params, "suhi", Some(i + 1));
            write_geotiff(&band.suhi, &suhi_path)?;
            outputs.push(suhi_path);
        }
    }

    let anomaly_path = output_path(params, "anomaly", None);
    write_geotiff(&results.anomaly, &anomaly_path)?;
    outputs.push(anomaly_path);

    let suhi_path = output_path(params, "suhi", None);
    write_geotiff(&results.suhi, &suhi_path)?;
    outputs.push(suhi_path);

    info!(
        accepted = accepted.len(),
        skipped = skipped.len(),
        bands = layout.band_count(),
        outputs = outputs.len(),
        "run complete"
    );

    Ok(RunSummary {
        accepted_scenes: accepted.len(),
        skipped_scenes: skipped,
        band_count: layout.band_count(),
        outputs,
    })
}

/// Regrid a raster onto the reference geometry when it differs
fn reconcile(raster: Raster<f64>, reference: &GridGeometry, what: &str) -> Result<Raster<f64>> {
    if raster.geometry().matches(reference) {
        return Ok(raster);
    }
    info!(
        input = what,
        from = %raster.geometry().describe(),
        to = %reference.describe(),
        "reconciling grid geometry"
    );
    regrid_nearest(&raster, reference)
}

/// Output file name encoding product, season and year:
/// `suhi_summer_2022.tif`, `anomaly_band2_summer_2022.tif`
fn output_path(params: &RunParams, stem: &str, band: Option<usize>) -> PathBuf {
    let name = match band {
        Some(i) => format!("{}_band{}_{}_{}.tif", stem, i, params.season, params.year),
        None => format!("{}_{}_{}.tif", stem, params.season, params.year),
    };
    params.output_dir.join(name)
}

/// Default parameter values for CLI construction
pub fn default_buffer_distance() -> f64 {
    URBAN_BUFFER_DISTANCE
}

/// Check a path exists before the run starts, for early diagnostics
pub fn check_input_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        return Err(calura_core::Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found: {}", what, path.display()),
        ))
        .into());
    }
    Ok(())
}
