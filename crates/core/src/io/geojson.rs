//! Minimal GeoJSON reading.
//!
//! Covers what the pipeline consumes: FeatureCollections of Polygon and
//! MultiPolygon features with scalar properties. Other geometry types
//! are skipped. Holes (interior rings) are preserved.

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use std::path::Path;

/// Read a GeoJSON file into a [`FeatureCollection`]
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_geojson(&text)
}

/// Parse GeoJSON text into a [`FeatureCollection`]
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| Error::geojson(format!("invalid JSON: {}", e)))?;

    match root.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = root
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::geojson("FeatureCollection without features array"))?;

            let mut collection = FeatureCollection::new();
            for value in features {
                if let Some(feature) = parse_feature(value)? {
                    collection.push(feature);
                }
            }
            Ok(collection)
        }
        Some("Feature") => {
            let mut collection = FeatureCollection::new();
            if let Some(feature) = parse_feature(&root)? {
                collection.push(feature);
            }
            Ok(collection)
        }
        other => Err(Error::geojson(format!(
            "expected FeatureCollection, got {:?}",
            other
        ))),
    }
}

/// Parse one feature; `None` for geometry types the pipeline ignores
fn parse_feature(value: &Value) -> Result<Option<Feature>> {
    let geometry = match value.get("geometry") {
        Some(g) if !g.is_null() => g,
        _ => return Ok(None),
    };

    let geom = match parse_geometry(geometry)? {
        Some(g) => g,
        None => return Ok(None),
    };

    let mut feature = Feature::new(geom);

    if let Some(props) = value.get("properties").and_then(Value::as_object) {
        for (key, prop) in props {
            feature.set_property(key.clone(), parse_attribute(prop));
        }
    }

    Ok(Some(feature))
}

fn parse_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => AttributeValue::String(s.clone()),
        // Nested structures are not classification tags; keep their text
        other => AttributeValue::String(other.to_string()),
    }
}

fn parse_geometry(value: &Value) -> Result<Option<Geometry<f64>>> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::geojson("geometry without type"))?;
    let coords = value
        .get("coordinates")
        .ok_or_else(|| Error::geojson("geometry without coordinates"))?;

    match kind {
        "Polygon" => Ok(Some(Geometry::Polygon(parse_polygon(coords)?))),
        "MultiPolygon" => {
            let parts = coords
                .as_array()
                .ok_or_else(|| Error::geojson("MultiPolygon coordinates must be an array"))?;
            let polygons = parts
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Geometry::MultiPolygon(MultiPolygon(polygons))))
        }
        // Points and lines never classify area; skip them
        _ => Ok(None),
    }
}

fn parse_polygon(coords: &Value) -> Result<Polygon<f64>> {
    let rings = coords
        .as_array()
        .ok_or_else(|| Error::geojson("Polygon coordinates must be an array of rings"))?;

    let mut exterior = None;
    let mut interiors = Vec::new();

    for (i, ring) in rings.iter().enumerate() {
        let line = parse_ring(ring)?;
        if i == 0 {
            exterior = Some(line);
        } else {
            interiors.push(line);
        }
    }

    let exterior = exterior.ok_or_else(|| Error::geojson("Polygon with no rings"))?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(ring: &Value) -> Result<LineString<f64>> {
    let positions = ring
        .as_array()
        .ok_or_else(|| Error::geojson("ring must be an array of positions"))?;

    let coords = positions
        .iter()
        .map(|pos| {
            let pair = pos
                .as_array()
                .ok_or_else(|| Error::geojson("position must be an array"))?;
            if pair.len() < 2 {
                return Err(Error::geojson("position needs x and y"));
            }
            let x = pair[0]
                .as_f64()
                .ok_or_else(|| Error::geojson("non-numeric x"))?;
            let y = pair[1]
                .as_f64()
                .ok_or_else(|| Error::geojson("non-numeric y"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LineString::from(coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDCOVER: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0], [0.0, 0.0]]]
                },
                "properties": {"landuse": "residential", "name": "centro"}
            },
            {
                "type": "Feature",
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[200.0, 0.0], [300.0, 0.0], [300.0, 100.0], [200.0, 0.0]]],
                        [[[400.0, 0.0], [500.0, 0.0], [500.0, 100.0], [400.0, 0.0]]]
                    ]
                },
                "properties": {"landuse": "farmland"}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                "properties": {"landuse": "residential"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let fc = parse_geojson(LANDCOVER).unwrap();
        // Point feature is skipped
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].tag("landuse"), Some("residential"));
        assert_eq!(fc.features[1].tag("landuse"), Some("farmland"));
    }

    #[test]
    fn test_polygon_coordinates() {
        let fc = parse_geojson(LANDCOVER).unwrap();
        match &fc.features[0].geometry {
            Some(Geometry::Polygon(p)) => {
                assert_eq!(p.exterior().0.len(), 5);
                assert_eq!(p.exterior().0[1], Coord { x: 100.0, y: 0.0 });
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_multipolygon_parts() {
        let fc = parse_geojson(LANDCOVER).unwrap();
        match &fc.features[1].geometry {
            Some(Geometry::MultiPolygon(mp)) => assert_eq!(mp.0.len(), 2),
            other => panic!("expected multipolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_non_geojson() {
        assert!(parse_geojson("{\"type\": \"Topology\"}").is_err());
        assert!(parse_geojson("not json").is_err());
    }
}
