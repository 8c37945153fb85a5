//! Landsat Collection-2 scene catalog.
//!
//! A scene is one satellite pass: a surface-temperature band file plus
//! a `QA_PIXEL` quality file, both single-band GeoTIFFs named with the
//! Collection-2 product id, e.g.
//! `LC08_L2SP_193029_20200718_20200912_02_T1_ST_B10.tif`.

use crate::error::Result;
use calura_core::io::read_geotiff;
use calura_core::{Error as CoreError, Raster};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Sensor family of a Landsat scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorFamily {
    /// Landsat 8/9 OLI-TIRS (`LC08`, `LC09`)
    OliTirs,
    /// Landsat 7 ETM+ (`LE07`)
    EtmPlus,
    /// Landsat 4/5 TM (`LT04`, `LT05`)
    Tm,
}

impl SensorFamily {
    /// Sensor family from the product-id prefix
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "LC08" | "LC09" => Some(SensorFamily::OliTirs),
            "LE07" => Some(SensorFamily::EtmPlus),
            "LT04" | "LT05" => Some(SensorFamily::Tm),
            _ => None,
        }
    }

    /// Surface-temperature band carried by this family
    pub fn thermal_band(&self) -> &'static str {
        match self {
            SensorFamily::OliTirs => "ST_B10",
            SensorFamily::EtmPlus | SensorFamily::Tm => "ST_B6",
        }
    }

    /// `QA_PIXEL` code marking a clear, valid observation
    pub fn clear_sky_code(&self) -> u16 {
        match self {
            SensorFamily::OliTirs => 21824,
            SensorFamily::EtmPlus | SensorFamily::Tm => 5440,
        }
    }

    /// Dates the family actually acquired data; scenes outside this
    /// window usually indicate a mislabeled file
    pub fn operational_range(&self) -> (NaiveDate, Option<NaiveDate>) {
        match self {
            SensorFamily::Tm => (
                NaiveDate::from_ymd_opt(1982, 7, 16).unwrap(),
                Some(NaiveDate::from_ymd_opt(2011, 6, 5).unwrap()),
            ),
            SensorFamily::EtmPlus => (
                NaiveDate::from_ymd_opt(1999, 4, 15).unwrap(),
                Some(NaiveDate::from_ymd_opt(2022, 4, 6).unwrap()),
            ),
            SensorFamily::OliTirs => (NaiveDate::from_ymd_opt(2013, 2, 11).unwrap(), None),
        }
    }
}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorFamily::OliTirs => "OLI-TIRS",
            SensorFamily::EtmPlus => "ETM+",
            SensorFamily::Tm => "TM",
        };
        write!(f, "{}", name)
    }
}

/// Inclusive date interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One satellite pass, fully loaded. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct SceneThermalObservation {
    pub scene_id: String,
    pub family: SensorFamily,
    pub acquired: NaiveDate,
    /// Raw surface-temperature digital numbers
    pub thermal: Raster<f64>,
    /// `QA_PIXEL` quality codes
    pub qa: Raster<u16>,
}

/// An on-disk scene: paths resolved, rasters not yet read
#[derive(Debug, Clone)]
pub struct SceneSource {
    pub scene_id: String,
    pub family: SensorFamily,
    pub acquired: NaiveDate,
    pub thermal_path: PathBuf,
    pub qa_path: PathBuf,
}

impl SceneSource {
    /// Read both rasters; the pair must share grid geometry
    pub fn load(&self) -> Result<SceneThermalObservation> {
        let thermal: Raster<f64> = read_geotiff(&self.thermal_path)?;
        let qa: Raster<u16> = read_geotiff(&self.qa_path)?;

        if !thermal.geometry().matches(&qa.geometry()) {
            return Err(CoreError::GridMismatch(format!(
                "scene {}: thermal {} vs QA {}",
                self.scene_id,
                thermal.geometry().describe(),
                qa.geometry().describe()
            ))
            .into());
        }

        Ok(SceneThermalObservation {
            scene_id: self.scene_id.clone(),
            family: self.family,
            acquired: self.acquired,
            thermal,
            qa,
        })
    }
}

/// Scenes discovered in a directory, ordered by scene id
#[derive(Debug, Default)]
pub struct SceneCatalog {
    pub scenes: Vec<SceneSource>,
}

impl SceneCatalog {
    /// Pair thermal-band and `QA_PIXEL` files under `dir` into scenes.
    ///
    /// Unpaired files are logged and dropped; files whose names do not
    /// parse as Collection-2 products are ignored.
    pub fn scan_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut thermal: BTreeMap<String, (SensorFamily, NaiveDate, PathBuf)> = BTreeMap::new();
        let mut qa: BTreeMap<String, PathBuf> = BTreeMap::new();

        for entry in std::fs::read_dir(dir.as_ref()).map_err(CoreError::Io)? {
            let entry = entry.map_err(CoreError::Io)?;
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };

            let parsed = match parse_scene_file(name) {
                Some(p) => p,
                None => continue,
            };

            if parsed.band == "QA_PIXEL" {
                qa.insert(parsed.scene_id, path);
            } else if parsed.band == parsed.family.thermal_band() {
                thermal.insert(parsed.scene_id, (parsed.family, parsed.acquired, path));
            }
        }

        let mut scenes = Vec::new();
        for (scene_id, (family, acquired, thermal_path)) in thermal {
            let qa_path = match qa.remove(&scene_id) {
                Some(p) => p,
                None => {
                    warn!(scene = %scene_id, "thermal band without QA_PIXEL file, scene dropped");
                    continue;
                }
            };

            let (op_start, op_end) = family.operational_range();
            if acquired < op_start || op_end.map(|end| acquired > end).unwrap_or(false) {
                warn!(
                    scene = %scene_id,
                    family = %family,
                    date = %acquired,
                    "acquisition date outside the sensor's operational period"
                );
            }

            scenes.push(SceneSource {
                scene_id,
                family,
                acquired,
                thermal_path,
                qa_path,
            });
        }

        for scene_id in qa.keys() {
            warn!(scene = %scene_id, "QA_PIXEL without thermal band file, scene dropped");
        }

        Ok(Self { scenes })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

struct ParsedSceneFile {
    scene_id: String,
    family: SensorFamily,
    acquired: NaiveDate,
    band: String,
}

/// Split a Collection-2 file name into product id, family, acquisition
/// date and band suffix.
///
/// `LC08_L2SP_193029_20200718_20200912_02_T1_ST_B10.tif` parses as
/// scene id `LC08_L2SP_193029_20200718_20200912_02_T1`, band `ST_B10`.
fn parse_scene_file(name: &str) -> Option<ParsedSceneFile> {
    let stem = name
        .strip_suffix(".tif")
        .or_else(|| name.strip_suffix(".TIF"))?;

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 8 {
        return None;
    }

    let family = SensorFamily::from_prefix(parts[0])?;
    let acquired = NaiveDate::parse_from_str(parts[3], "%Y%m%d").ok()?;

    Some(ParsedSceneFile {
        scene_id: parts[..7].join("_"),
        family,
        acquired,
        band: parts[7..].join("_"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oli_thermal() {
        let p = parse_scene_file("LC08_L2SP_193029_20200718_20200912_02_T1_ST_B10.tif").unwrap();
        assert_eq!(p.family, SensorFamily::OliTirs);
        assert_eq!(p.scene_id, "LC08_L2SP_193029_20200718_20200912_02_T1");
        assert_eq!(p.band, "ST_B10");
        assert_eq!(p.acquired, NaiveDate::from_ymd_opt(2020, 7, 18).unwrap());
    }

    #[test]
    fn test_parse_etm_qa_uppercase_extension() {
        let p = parse_scene_file("LE07_L2SP_193029_20040812_20200915_02_T1_QA_PIXEL.TIF").unwrap();
        assert_eq!(p.family, SensorFamily::EtmPlus);
        assert_eq!(p.band, "QA_PIXEL");
    }

    #[test]
    fn test_parse_rejects_foreign_files() {
        assert!(parse_scene_file("dem.tif").is_none());
        assert!(parse_scene_file("S2A_MSIL2A_20200718.tif").is_none());
        assert!(parse_scene_file("LC08_L2SP_193029_20200718_20200912_02_T1_ST_B10.txt").is_none());
    }

    #[test]
    fn test_clear_sky_codes() {
        assert_eq!(SensorFamily::OliTirs.clear_sky_code(), 21824);
        assert_eq!(SensorFamily::EtmPlus.clear_sky_code(), 5440);
        assert_eq!(SensorFamily::Tm.clear_sky_code(), 5440);
    }

    #[test]
    fn test_thermal_band_per_family() {
        assert_eq!(SensorFamily::OliTirs.thermal_band(), "ST_B10");
        assert_eq!(SensorFamily::EtmPlus.thermal_band(), "ST_B6");
        assert_eq!(SensorFamily::Tm.thermal_band(), "ST_B6");
    }

    #[test]
    fn test_date_range_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 8, 31).unwrap(),
        );
        assert!(range.contains(NaiveDate::from_ymd_opt(2022, 6, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2022, 8, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2022, 9, 1).unwrap()));
    }

    #[test]
    fn test_scan_dir_pairs_files() {
        let dir = tempfile::tempdir().unwrap();
        let touch = |name: &str| {
            let mut r: Raster<f64> = Raster::filled(2, 2, 1.0);
            r.set_transform(calura_core::GeoTransform::new(0.0, 60.0, 30.0, -30.0));
            calura_core::io::write_geotiff(&r, dir.path().join(name)).unwrap();
        };

        touch("LC08_L2SP_193029_20220715_20220722_02_T1_ST_B10.tif");
        touch("LC08_L2SP_193029_20220715_20220722_02_T1_QA_PIXEL.tif");
        // Thermal without QA: dropped
        touch("LC08_L2SP_193029_20220816_20220822_02_T1_ST_B10.tif");
        // Unrelated raster: ignored
        touch("dem.tif");

        let catalog = SceneCatalog::scan_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        let scene = &catalog.scenes[0];
        assert_eq!(scene.family, SensorFamily::OliTirs);
        assert_eq!(
            scene.acquired,
            NaiveDate::from_ymd_opt(2022, 7, 15).unwrap()
        );

        let loaded = scene.load().unwrap();
        assert_eq!(loaded.thermal.shape(), (2, 2));
        assert_eq!(loaded.qa.get(0, 0).unwrap(), 1);
    }
}
