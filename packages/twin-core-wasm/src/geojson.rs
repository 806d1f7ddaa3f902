// Typed GeoJSON envelope and the normalizer that flattens it into a uniform
// feature list for the layer loader.

use serde::{Deserialize, Serialize};

use crate::error::TwinError;

/// The seven canonical geometry types. Anything else in a `type` field is a
/// hard validation error, not a warning.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Vec<f64> },
    MultiPoint { coordinates: Vec<Vec<f64>> },
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Feature {
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Envelope forms accepted by the loader. A bare geometry is a valid GeoJSON
/// document, so it is accepted alongside Feature/FeatureCollection. Built by
/// [`parse_document`], which dispatches on the `type` field itself.
#[derive(Clone, Debug)]
pub enum GeoJson {
    Feature(Feature),
    FeatureCollection { features: Vec<Feature> },
    Geometry(Geometry),
}

/// One entry of the flattened document: a concrete geometry plus the property
/// bag it carries into rendering.
#[derive(Clone, Debug)]
pub struct NormalizedFeature {
    pub geometry: Geometry,
    pub properties: serde_json::Value,
}

/// Parse a GeoJSON value, failing on any envelope or geometry type outside
/// the canonical set. Validation happens here, ahead of any scene mutation,
/// so a malformed document never half-applies.
pub fn parse_document(value: serde_json::Value) -> Result<GeoJson, TwinError> {
    let type_name = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| TwinError::InvalidInput("document has no 'type' field".to_string()))?
        .to_string();

    if !is_known_type(&type_name) {
        return Err(TwinError::UnsupportedGeometry(type_name));
    }

    let parsed = match type_name.as_str() {
        "Feature" => GeoJson::Feature(deserialize_feature(value)?),
        "FeatureCollection" => {
            // A missing or null feature list means an empty collection, so
            // loading it is nothing to do rather than an error.
            let features = match value.get("features") {
                None | Some(serde_json::Value::Null) => Vec::new(),
                Some(features) => {
                    let features: Vec<serde_json::Value> =
                        serde_json::from_value(features.clone())
                            .map_err(|e| TwinError::InvalidInput(e.to_string()))?;
                    features
                        .into_iter()
                        .map(deserialize_feature)
                        .collect::<Result<Vec<Feature>, TwinError>>()?
                }
            };
            GeoJson::FeatureCollection { features }
        }
        _ => GeoJson::Geometry(deserialize_geometry(value)?),
    };

    Ok(parsed)
}

/// Flatten an envelope into an ordered feature list (input order preserved).
/// GeometryCollection members inherit the enclosing feature's properties;
/// a feature with `geometry: null` contributes nothing.
pub fn normalize(document: GeoJson) -> Vec<NormalizedFeature> {
    let mut flattened = Vec::new();

    match document {
        GeoJson::Feature(feature) => flatten_feature(feature, &mut flattened),
        GeoJson::FeatureCollection { features } => {
            for feature in features {
                flatten_feature(feature, &mut flattened);
            }
        }
        GeoJson::Geometry(geometry) => flatten_geometry(geometry, serde_json::Value::Null, &mut flattened),
    }

    flattened
}

fn flatten_feature(feature: Feature, out: &mut Vec<NormalizedFeature>) {
    if let Some(geometry) = feature.geometry {
        flatten_geometry(geometry, feature.properties, out);
    }
}

fn flatten_geometry(geometry: Geometry, properties: serde_json::Value, out: &mut Vec<NormalizedFeature>) {
    match geometry {
        Geometry::GeometryCollection { geometries } => {
            for member in geometries {
                flatten_geometry(member, properties.clone(), out);
            }
        }
        other => out.push(NormalizedFeature {
            geometry: other,
            properties,
        }),
    }
}

fn deserialize_feature(value: serde_json::Value) -> Result<Feature, TwinError> {
    // Validate the geometry type before handing the value to serde so an
    // unknown type is reported as such instead of a generic parse error.
    if let Some(geometry) = value.get("geometry") {
        if !geometry.is_null() {
            let geometry_type = geometry
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| {
                    TwinError::InvalidInput("feature geometry has no 'type' field".to_string())
                })?;
            if !is_geometry_type(geometry_type) {
                return Err(TwinError::UnsupportedGeometry(geometry_type.to_string()));
            }
        }
    }
    serde_json::from_value(value).map_err(|e| TwinError::InvalidInput(e.to_string()))
}

fn deserialize_geometry(value: serde_json::Value) -> Result<Geometry, TwinError> {
    serde_json::from_value(value).map_err(|e| {
        let message = e.to_string();
        if message.contains("unknown variant") {
            TwinError::UnsupportedGeometry(message)
        } else {
            TwinError::InvalidInput(message)
        }
    })
}

fn is_geometry_type(name: &str) -> bool {
    matches!(
        name,
        "Point"
            | "MultiPoint"
            | "LineString"
            | "MultiLineString"
            | "Polygon"
            | "MultiPolygon"
            | "GeometryCollection"
    )
}

fn is_known_type(name: &str) -> bool {
    is_geometry_type(name) || matches!(name, "Feature" | "FeatureCollection")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_feature_collection_in_order() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "name": "a" },
                  "geometry": { "type": "Point", "coordinates": [1.0, 2.0] } },
                { "type": "Feature", "properties": { "name": "b" },
                  "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] } }
            ]
        });

        let flattened = normalize(parse_document(doc).unwrap());
        assert_eq!(flattened.len(), 2);
        assert_eq!(flattened[0].properties["name"], "a");
        assert_eq!(flattened[1].properties["name"], "b");
        assert!(matches!(flattened[1].geometry, Geometry::LineString { .. }));
    }

    #[test]
    fn geometry_collection_members_inherit_properties() {
        let doc = json!({
            "type": "Feature",
            "properties": { "depth": 7 },
            "geometry": {
                "type": "GeometryCollection",
                "geometries": [
                    { "type": "Point", "coordinates": [0.0, 0.0] },
                    { "type": "Point", "coordinates": [1.0, 1.0] }
                ]
            }
        });

        let flattened = normalize(parse_document(doc).unwrap());
        assert_eq!(flattened.len(), 2);
        assert_eq!(flattened[0].properties["depth"], 7);
        assert_eq!(flattened[1].properties["depth"], 7);
    }

    #[test]
    fn null_geometry_contributes_nothing() {
        let doc = json!({ "type": "Feature", "properties": {}, "geometry": null });
        let flattened = normalize(parse_document(doc).unwrap());
        assert!(flattened.is_empty());
    }

    #[test]
    fn collection_without_feature_list_is_empty() {
        let doc = json!({ "type": "FeatureCollection" });
        assert!(normalize(parse_document(doc).unwrap()).is_empty());

        let doc = json!({ "type": "FeatureCollection", "features": null });
        assert!(normalize(parse_document(doc).unwrap()).is_empty());
    }

    #[test]
    fn unknown_envelope_type_is_an_error() {
        let doc = json!({ "type": "FeatureBundle", "features": [] });
        match parse_document(doc) {
            Err(TwinError::UnsupportedGeometry(name)) => assert_eq!(name, "FeatureBundle"),
            other => panic!("expected UnsupportedGeometry, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unknown_geometry_type_fails_the_whole_document() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Point", "coordinates": [0.0, 0.0] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Circle", "coordinates": [0.0, 0.0] } }
            ]
        });
        assert!(matches!(
            parse_document(doc),
            Err(TwinError::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn bare_geometry_is_a_valid_document() {
        let doc = json!({ "type": "Point", "coordinates": [3.0, 4.0] });
        let flattened = normalize(parse_document(doc).unwrap());
        assert_eq!(flattened.len(), 1);
    }
}
