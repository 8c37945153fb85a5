//! Vector features for land-cover and boundary layers

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types carried by vector features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// The value as a string slice, when it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A geographic feature: geometry plus attributes.
///
/// Land-cover features carry a classification tag (e.g. a `landuse`
/// attribute) that the mask builder matches against its category lists.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a feature with geometry and no attributes
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// The string value of a classification attribute, if present
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Features whose classification attribute `key` matches one of the
    /// given category values.
    ///
    /// One parameterized selection serves every land-cover category, so
    /// urban and rural-reference layers are built by the same code path.
    pub fn with_categories(&self, key: &str, categories: &[String]) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .filter(|f| {
                f.tag(key)
                    .map(|t| categories.iter().any(|c| c == t))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        FeatureCollection { features }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Geometry};

    fn tagged_feature(tag: &str) -> Feature {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let mut f = Feature::new(Geometry::Polygon(poly));
        f.set_property("landuse", AttributeValue::String(tag.to_string()));
        f
    }

    #[test]
    fn test_with_categories() {
        let mut fc = FeatureCollection::new();
        fc.push(tagged_feature("residential"));
        fc.push(tagged_feature("industrial"));
        fc.push(tagged_feature("farmland"));

        let urban = fc.with_categories(
            "landuse",
            &["residential".to_string(), "industrial".to_string()],
        );
        assert_eq!(urban.len(), 2);

        let rural = fc.with_categories("landuse", &["farmland".to_string()]);
        assert_eq!(rural.len(), 1);
        assert_eq!(rural.features[0].tag("landuse"), Some("farmland"));
    }

    #[test]
    fn test_missing_tag_excluded() {
        let mut fc = FeatureCollection::new();
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0)];
        fc.push(Feature::new(Geometry::Polygon(poly)));

        let selected = fc.with_categories("landuse", &["residential".to_string()]);
        assert!(selected.is_empty());
    }
}
