//! End-to-end run on a synthetic city.
//!
//! Builds a 20x20 working grid (30 m cells, UTM 32N): urban blocks on
//! the west side running warm, farmland on the east as the rural
//! reference, a DEM rising northward, two scenes of which one is mostly
//! cloudy. Exercises the whole chain from files on disk to output
//! rasters.

use calura_core::io::{read_geotiff, write_geotiff};
use calura_core::{Crs, GeoTransform, Raster};
use calura_pipeline::quality::{DN_OFFSET, DN_SCALE, KELVIN_OFFSET};
use calura_pipeline::run::{self, RunParams, Season};
use std::path::Path;

const ROWS: usize = 20;
const COLS: usize = 20;

fn transform() -> GeoTransform {
    GeoTransform::new(680_000.0, 4_930_000.0, 30.0, -30.0)
}

fn base_raster(value: f64) -> Raster<f64> {
    let mut r = Raster::filled(ROWS, COLS, value);
    r.set_transform(transform());
    r.set_crs(Some(Crs::utm(32, true)));
    r
}

/// Thermal DN raster: urban columns (west) run ~3.4 degC warmer
fn thermal_scene() -> Raster<f64> {
    let mut dn = base_raster(44000.0);
    for row in 0..ROWS {
        for col in 0..6 {
            dn.set(row, col, 45000.0).unwrap();
        }
    }
    dn
}

/// QA raster: `invalid_cells` cells carry a non-clear code
fn qa_scene(invalid_cells: usize) -> Raster<f64> {
    let mut qa = base_raster(21824.0);
    for i in 0..invalid_cells {
        qa.set(i / COLS, i % COLS, 1.0).unwrap();
    }
    qa
}

/// DEM rising northward: row 0 is highest so both elevation bands hold
/// urban and rural cells
fn dem() -> Raster<f64> {
    let mut dem = base_raster(0.0);
    for row in 0..ROWS {
        for col in 0..COLS {
            dem.set(row, col, 50.0 + (ROWS - 1 - row) as f64 * 11.0).unwrap();
        }
    }
    dem
}

fn geojson_rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64, tag: &str) -> String {
    format!(
        r#"{{"type": "Feature",
            "geometry": {{"type": "Polygon", "coordinates":
                [[[{x0}, {y0}], [{x1}, {y0}], [{x1}, {y1}], [{x0}, {y1}], [{x0}, {y0}]]]}},
            "properties": {{"landuse": "{tag}"}}}}"#,
        x0 = min_x,
        y0 = min_y,
        x1 = max_x,
        y1 = max_y,
        tag = tag
    )
}

/// Urban west strip (cols 0..5), farmland east block (cols 10..19
/// after the 100 m buffer), boundary covering the full grid
fn write_vectors(dir: &Path) {
    let landcover = format!(
        r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
        geojson_rect(680_000.0, 4_929_400.0, 680_180.0, 4_930_000.0, "residential"),
        geojson_rect(680_240.0, 4_929_400.0, 680_600.0, 4_930_000.0, "farmland"),
    );
    std::fs::write(dir.join("landcover.geojson"), landcover).unwrap();

    let boundary = format!(
        r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
        geojson_rect(680_000.0, 4_929_400.0, 680_600.0, 4_930_000.0, "study-area"),
    );
    std::fs::write(dir.join("boundary.geojson"), boundary).unwrap();
}

fn write_inputs(dir: &Path) {
    let scene_dir = dir.join("scenes");
    std::fs::create_dir_all(&scene_dir).unwrap();

    // Clean July scene
    write_geotiff(
        &thermal_scene(),
        scene_dir.join("LC08_L2SP_193029_20220715_20220722_02_T1_ST_B10.tif"),
    )
    .unwrap();
    write_geotiff(
        &qa_scene(0),
        scene_dir.join("LC08_L2SP_193029_20220715_20220722_02_T1_QA_PIXEL.tif"),
    )
    .unwrap();

    // August scene with 80% of cells cloudy: must be skipped
    write_geotiff(
        &thermal_scene(),
        scene_dir.join("LC09_L2SP_193029_20220808_20220812_02_T1_ST_B10.tif"),
    )
    .unwrap();
    write_geotiff(
        &qa_scene(320),
        scene_dir.join("LC09_L2SP_193029_20220808_20220812_02_T1_QA_PIXEL.tif"),
    )
    .unwrap();

    // May scene, outside the summer range: must be skipped
    write_geotiff(
        &thermal_scene(),
        scene_dir.join("LC08_L2SP_193029_20220501_20220508_02_T1_ST_B10.tif"),
    )
    .unwrap();
    write_geotiff(
        &qa_scene(0),
        scene_dir.join("LC08_L2SP_193029_20220501_20220508_02_T1_QA_PIXEL.tif"),
    )
    .unwrap();

    write_geotiff(&dem(), dir.join("dem.tif")).unwrap();
    write_vectors(dir);
}

fn params(dir: &Path) -> RunParams {
    RunParams {
        scene_dir: dir.join("scenes"),
        landcover_path: dir.join("landcover.geojson"),
        category_key: "landuse".to_string(),
        urban_categories: vec!["residential".to_string()],
        rural_categories: vec!["farmland".to_string()],
        dem_path: dir.join("dem.tif"),
        boundary_path: dir.join("boundary.geojson"),
        season: Season::Summer,
        year: 2022,
        date_range: None,
        output_dir: dir.join("out"),
        buffer_distance: 100.0,
    }
}

#[test]
fn full_run_produces_banded_outputs() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let summary = run::execute(&params(dir.path())).unwrap();

    // One clean scene in range; cloudy and off-season scenes skipped
    assert_eq!(summary.accepted_scenes, 1);
    assert_eq!(summary.skipped_scenes.len(), 2);

    // DEM spans 50..259 over urban cells: rounded range 210 → 2 bands
    assert_eq!(summary.band_count, 2);

    let out = dir.path().join("out");
    for name in [
        "lst_mean_summer_2022.tif",
        "anomaly_band1_summer_2022.tif",
        "suhi_band1_summer_2022.tif",
        "anomaly_band2_summer_2022.tif",
        "suhi_band2_summer_2022.tif",
        "anomaly_summer_2022.tif",
        "suhi_summer_2022.tif",
    ] {
        assert!(out.join(name).exists(), "missing output {}", name);
    }
}

#[test]
fn composite_equals_the_single_clean_scene() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    run::execute(&params(dir.path())).unwrap();

    let composite: Raster<f64> =
        read_geotiff(dir.path().join("out/lst_mean_summer_2022.tif")).unwrap();

    // The cloudy scene was excluded, so the composite is exactly the
    // clean scene's LST
    let urban_expected = 45000.0 * DN_SCALE + DN_OFFSET - KELVIN_OFFSET;
    let rural_expected = 44000.0 * DN_SCALE + DN_OFFSET - KELVIN_OFFSET;

    for row in 0..ROWS {
        for col in 0..COLS {
            let v = composite.get(row, col).unwrap();
            let expected = if col < 6 { urban_expected } else { rural_expected };
            // float32 storage rounds the value
            assert!(
                (v - expected).abs() < 1e-3,
                "composite mismatch at ({}, {}): {} vs {}",
                row,
                col,
                v,
                expected
            );
        }
    }
}

#[test]
fn anomaly_warm_in_urban_zero_in_rural() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    run::execute(&params(dir.path())).unwrap();

    let anomaly: Raster<f64> =
        read_geotiff(dir.path().join("out/anomaly_summer_2022.tif")).unwrap();

    // Row 0 sits at altitude 259, above the top band [150, 250): the
    // band arithmetic leaves that sliver uncovered on purpose
    assert!(anomaly.get(0, 0).unwrap().is_nan());

    // Urban cells sit ~3.42 degC above the rural reference
    let dn_delta = (45000.0 - 44000.0) * DN_SCALE;
    for row in 1..ROWS {
        let urban = anomaly.get(row, 0).unwrap();
        assert!(
            (urban - dn_delta).abs() < 1e-3,
            "urban anomaly at row {}: {}",
            row,
            urban
        );
        let rural = anomaly.get(row, 15).unwrap();
        assert!(rural.abs() < 1e-3, "rural anomaly at row {}: {}", row, rural);
    }
}

#[test]
fn suhi_stays_in_unit_interval() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    run::execute(&params(dir.path())).unwrap();

    let suhi: Raster<f64> = read_geotiff(dir.path().join("out/suhi_summer_2022.tif")).unwrap();

    let mut seen_valid = false;
    for &v in suhi.data().iter() {
        if v.is_nan() {
            continue;
        }
        seen_valid = true;
        assert!((0.0..=1.0).contains(&v), "SUHI out of range: {}", v);
    }
    assert!(seen_valid, "SUHI output is entirely nodata");
}

#[test]
fn rerun_overwrites_outputs_byte_identically() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    run::execute(&params(dir.path())).unwrap();
    let first = std::fs::read(dir.path().join("out/suhi_summer_2022.tif")).unwrap();

    run::execute(&params(dir.path())).unwrap();
    let second = std::fs::read(dir.path().join("out/suhi_summer_2022.tif")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn missing_rural_reference_aborts() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let mut p = params(dir.path());
    // No feature carries this tag: the rural mask comes out empty
    p.rural_categories = vec!["wetland".to_string()];

    let err = run::execute(&p).unwrap_err();
    assert!(
        matches!(err, calura_pipeline::Error::EmptyReferenceArea(_)),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn no_scene_in_range_aborts() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let mut p = params(dir.path());
    p.year = 1995;

    let err = run::execute(&p).unwrap_err();
    assert!(
        matches!(err, calura_pipeline::Error::NoValidScenes { .. }),
        "unexpected error: {:?}",
        err
    );
}
