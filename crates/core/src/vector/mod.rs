//! Vector features and area-of-interest selection

use crate::error::{Error, Result};
use geo_types::{MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

/// A polygonal feature with attributes.
///
/// Only areal geometry is modelled; a single polygon is stored as a
/// one-member multipolygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub properties: BTreeMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self {
            geometry,
            properties: BTreeMap::new(),
        }
    }

    pub fn from_polygon(polygon: Polygon<f64>) -> Self {
        Self::new(MultiPolygon::new(vec![polygon]))
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
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

    /// Select the single feature whose `field` equals `name` exactly.
    ///
    /// Zero matches is [`Error::EmptyAoi`], several is
    /// [`Error::AmbiguousAoi`]. Comparison is case sensitive.
    pub fn select_one(&self, field: &str, name: &str) -> Result<Aoi> {
        let mut matches = self
            .features
            .iter()
            .filter(|f| f.get_property(field).and_then(AttributeValue::as_str) == Some(name));

        let first = matches.next().ok_or_else(|| Error::EmptyAoi {
            field: field.to_string(),
            name: name.to_string(),
        })?;

        let extra = matches.count();
        if extra > 0 {
            return Err(Error::AmbiguousAoi {
                field: field.to_string(),
                name: name.to_string(),
                count: extra + 1,
            });
        }

        Ok(Aoi {
            name: name.to_string(),
            feature: first.clone(),
        })
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// The area of interest: one named polygonal feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    pub name: String,
    pub feature: Feature,
}

impl Aoi {
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.feature.geometry
    }

    /// The AOI as a one-feature collection, for re-export
    pub fn to_collection(&self) -> FeatureCollection {
        FeatureCollection {
            features: vec![self.feature.clone()],
        }
    }
}
