//! GeoJSON reading and writing for polygonal feature collections

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geo_types::{MultiPolygon, Polygon};
use geojson::{GeoJson, Geometry, JsonObject, Value as GeometryValue};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Read a GeoJSON FeatureCollection.
///
/// Polygon and MultiPolygon features are kept; features with other
/// geometry types are skipped. A feature without geometry is kept with an
/// empty one so that its attributes can still be matched.
pub fn read_feature_collection<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let geojson: GeoJson = serde_json::from_reader(reader)?;
    from_geojson(geojson)
}

pub fn read_feature_collection_from_str(text: &str) -> Result<FeatureCollection> {
    from_geojson(text.parse::<GeoJson>()?)
}

/// Write features as a GeoJSON FeatureCollection
pub fn write_feature_collection<P: AsRef<Path>>(fc: &FeatureCollection, path: P) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, &to_geojson(fc))?;
    Ok(())
}

pub fn write_feature_collection_to_string(fc: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_geojson(fc))?)
}

fn from_geojson(geojson: GeoJson) -> Result<FeatureCollection> {
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(Error::UnsupportedDataType(
            "expected a GeoJSON FeatureCollection".into(),
        ));
    };

    let mut fc = FeatureCollection::new();
    for gf in collection.features {
        let geometry = match gf.geometry.map(|g| g.value) {
            Some(value @ GeometryValue::Polygon(_)) => {
                MultiPolygon::new(vec![Polygon::try_from(value)?])
            }
            Some(value @ GeometryValue::MultiPolygon(_)) => MultiPolygon::try_from(value)?,
            Some(_) => continue,
            None => MultiPolygon::new(Vec::new()),
        };

        let mut feature = Feature::new(geometry);
        for (key, value) in gf.properties.unwrap_or_default() {
            feature.set_property(key, attribute_from_json(value));
        }
        fc.push(feature);
    }
    Ok(fc)
}

fn attribute_from_json(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn to_geojson(fc: &FeatureCollection) -> GeoJson {
    let features = fc
        .iter()
        .map(|f| {
            let geometry = match f.geometry.0.as_slice() {
                [] => None,
                [single] => Some(Geometry::new(GeometryValue::from(single))),
                _ => Some(Geometry::new(GeometryValue::from(&f.geometry))),
            };
            let properties: JsonObject = f
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry,
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    GeoJson::FeatureCollection(geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIOMES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"nombre": "Chiquitano", "id": 3, "meta": {"src": "mb"}},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[-62.0, -18.0], [-58.0, -18.0], [-58.0, -14.0], [-62.0, -14.0], [-62.0, -18.0]],
                        [[-61.0, -17.0], [-60.0, -17.0], [-60.0, -16.0], [-61.0, -17.0]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {"nombre": "Chaco"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[-63.0, -22.0, 0.0], [-60.0, -22.0, 0.0], [-60.0, -19.0, 0.0], [-63.0, -22.0, 0.0]]],
                        [[[-59.0, -21.0], [-58.0, -21.0], [-58.0, -20.0], [-59.0, -21.0]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn test_read_polygon_with_hole() {
        let fc = read_feature_collection_from_str(BIOMES).unwrap();
        assert_eq!(fc.len(), 2);

        let chiquitano = fc.select_one("nombre", "Chiquitano").unwrap();
        let poly = &chiquitano.geometry().0[0];
        assert_eq!(poly.interiors().len(), 1);
        assert_eq!(
            chiquitano.feature.get_property("id"),
            Some(&AttributeValue::Int(3))
        );
    }

    #[test]
    fn test_read_multipolygon_ignores_z() {
        let fc = read_feature_collection_from_str(BIOMES).unwrap();
        let chaco = fc.select_one("nombre", "Chaco").unwrap();
        assert_eq!(chaco.geometry().0.len(), 2);
    }

    #[test]
    fn test_rejects_non_collection() {
        let text = r#"{"type": "Topology", "features": []}"#;
        assert!(read_feature_collection_from_str(text).is_err());

        let single = r#"{"type": "Feature", "properties": {}, "geometry": null}"#;
        assert!(matches!(
            read_feature_collection_from_str(single),
            Err(Error::UnsupportedDataType(_))
        ));
    }

    #[test]
    fn test_skips_non_areal_features() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"nombre": "Roboré"},
                    "geometry": {"type": "Point", "coordinates": [-59.75, -18.33]}
                },
                {
                    "type": "Feature",
                    "properties": {"nombre": "Río Tucavaca"},
                    "geometry": {"type": "LineString", "coordinates": [[-60.0, -18.0], [-59.0, -18.5]]}
                },
                {
                    "type": "Feature",
                    "properties": {"nombre": "Chiquitano"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-62.0, -18.0], [-58.0, -18.0], [-58.0, -14.0], [-62.0, -18.0]]]
                    }
                }
            ]
        }"#;
        let fc = read_feature_collection_from_str(text).unwrap();
        assert_eq!(fc.len(), 1);
        assert!(fc.select_one("nombre", "Chiquitano").is_ok());
    }

    #[test]
    fn test_write_then_read_aoi() {
        let fc = read_feature_collection_from_str(BIOMES).unwrap();
        let aoi = fc.select_one("nombre", "Chiquitano").unwrap();

        let text = write_feature_collection_to_string(&aoi.to_collection()).unwrap();
        let back = read_feature_collection_from_str(&text).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.features[0], aoi.feature);
    }
}
