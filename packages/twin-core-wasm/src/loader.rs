// Layer build pipeline: parse, reproject, normalize, then turn each feature
// into scene objects. Everything is built before anything is installed, so a
// failing feature leaves the world untouched.

use std::str::FromStr;

use geo::algorithm::centroid::Centroid;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::error::TwinError;
use crate::extrude::extrude_shapes;
use crate::geojson::{normalize, parse_document, Geometry, NormalizedFeature};
use crate::instanced::DEFAULT_ROTATION_Y;
use crate::material::material_from_properties;
use crate::models::{merge_properties, LayerKind, ModelPlacement, SceneObject, ScenePayload};
use crate::projection::reproject_document;
use crate::shape::{shapes_from_multi_polygon, shapes_from_polygon};
use crate::world::TwinWorld;

pub struct LoadRequest {
    pub layer_id: String,
    pub kind: LayerKind,
    pub document: serde_json::Value,
    /// Layer defaults merged under each feature's own properties.
    pub properties: serde_json::Value,
}

impl LoadRequest {
    pub fn parse(
        layer_id: &str,
        kind: &str,
        document: serde_json::Value,
        properties: serde_json::Value,
    ) -> Result<Self, TwinError> {
        Ok(LoadRequest {
            layer_id: layer_id.to_string(),
            kind: LayerKind::from_str(kind)?,
            document,
            properties,
        })
    }
}

/// Build the scene payload for one layer. The world provides the origin and
/// the polygon offset counter; nothing is installed here. An empty feature
/// list is nothing to do, so it yields `None` rather than an empty layer.
pub fn build_layer(
    world: &mut TwinWorld,
    request: LoadRequest,
    token: Option<&CancellationToken>,
) -> Result<Option<ScenePayload>, TwinError> {
    let LoadRequest {
        layer_id,
        kind,
        document,
        properties,
    } = request;

    if let Some(token) = token {
        token.check()?;
    }

    let mut document = parse_document(document)?;
    reproject_document(&mut document);
    let features = normalize(document);

    if features.is_empty() {
        return Ok(None);
    }

    if let Some(token) = token {
        token.check()?;
    }

    let origin = world.origin;
    let mut objects = Vec::new();

    match kind {
        LayerKind::Extrude => {
            for feature in &features {
                let merged = merge_properties(&properties, &feature.properties);
                build_extruded(world, &layer_id, feature, &merged, origin, &mut objects)?;
                if let Some(token) = token {
                    token.check()?;
                }
            }
        }
        LayerKind::Model | LayerKind::Gltf => {
            for feature in &features {
                let merged = merge_properties(&properties, &feature.properties);
                build_model(&layer_id, feature, &merged, origin, &mut objects)?;
                if let Some(token) = token {
                    token.check()?;
                }
            }
        }
        LayerKind::Dem => {
            build_terrain(&layer_id, &properties, &features, origin, &mut objects)?;
        }
    }

    if let Some(token) = token {
        token.check()?;
    }

    Ok(Some(ScenePayload { layer_id, objects }))
}

/// One scene object per planar shape, so every member polygon of a multi
/// geometry gets its own object.
fn build_extruded(
    world: &mut TwinWorld,
    layer_id: &str,
    feature: &NormalizedFeature,
    merged: &serde_json::Value,
    origin: [f64; 2],
    objects: &mut Vec<SceneObject>,
) -> Result<(), TwinError> {
    let shapes = match &feature.geometry {
        Geometry::Polygon { coordinates } => shapes_from_polygon(coordinates),
        Geometry::MultiPolygon { coordinates } => shapes_from_multi_polygon(coordinates),
        // Non-areal geometry has no volume to extrude.
        _ => return Ok(()),
    };

    let depth = merged.get("depth").and_then(|d| d.as_f64()).unwrap_or(2.0);
    let altitude = merged
        .get("altitude")
        .and_then(|a| a.as_f64())
        .unwrap_or(0.0);
    let material = material_from_properties(merged);
    let polygon_offset = world.next_polygon_offset();

    for shape in shapes {
        let mut mesh = extrude_shapes(&[shape], depth)?;
        if !mesh.has_data {
            continue;
        }
        mesh.translate(-origin[0], -origin[1], altitude);

        let mut properties = merged.clone();
        if let Some(map) = properties.as_object_mut() {
            map.insert("polygonOffset".to_string(), polygon_offset.into());
        }

        objects.push(SceneObject {
            id: Uuid::new_v4().to_string(),
            layer_id: layer_id.to_string(),
            geometry: Some(mesh),
            material: material.clone(),
            model: None,
            properties,
        });
    }

    Ok(())
}

/// Anchor a model asset at the feature's centroid. The asset itself is
/// loaded by the host; a feature without a url is an input error.
fn build_model(
    layer_id: &str,
    feature: &NormalizedFeature,
    merged: &serde_json::Value,
    origin: [f64; 2],
    objects: &mut Vec<SceneObject>,
) -> Result<(), TwinError> {
    let url = merged
        .get("url")
        .or_else(|| merged.get("model"))
        .and_then(|u| u.as_str())
        .ok_or_else(|| {
            TwinError::InvalidInput(format!(
                "model layer '{layer_id}' feature has no 'url' property"
            ))
        })?;

    let Some([cx, cy]) = centroid(&feature.geometry) else {
        return Ok(());
    };

    let altitude = merged
        .get("altitude")
        .and_then(|a| a.as_f64())
        .unwrap_or(0.0);
    let rotation_y = merged
        .get("rotation")
        .and_then(|r| r.as_f64())
        .unwrap_or(DEFAULT_ROTATION_Y);
    let scale = merged.get("scale").and_then(|s| s.as_f64()).unwrap_or(1.0);

    objects.push(SceneObject {
        id: Uuid::new_v4().to_string(),
        layer_id: layer_id.to_string(),
        geometry: None,
        material: material_from_properties(merged),
        model: Some(ModelPlacement {
            url: url.to_string(),
            position: [cx - origin[0], altitude, -(cy - origin[1])],
            rotation_y,
            scale,
        }),
        properties: merged.clone(),
    });

    Ok(())
}

/// Collect every coordinate in the document into one TIN surface.
fn build_terrain(
    layer_id: &str,
    properties: &serde_json::Value,
    features: &[NormalizedFeature],
    origin: [f64; 2],
    objects: &mut Vec<SceneObject>,
) -> Result<(), TwinError> {
    let mut samples: Vec<[f64; 3]> = Vec::new();
    for feature in features {
        collect_samples(&feature.geometry, &mut samples);
    }

    let altitude = properties
        .get("altitude")
        .and_then(|a| a.as_f64())
        .unwrap_or(0.0);

    let mut mesh = crate::dem::triangulate_terrain(&samples)?;
    mesh.translate(-origin[0], -origin[1], altitude);

    objects.push(SceneObject {
        id: Uuid::new_v4().to_string(),
        layer_id: layer_id.to_string(),
        geometry: Some(mesh),
        material: material_from_properties(properties),
        model: None,
        properties: properties.clone(),
    });

    Ok(())
}

fn collect_samples(geometry: &Geometry, samples: &mut Vec<[f64; 3]>) {
    match geometry {
        Geometry::Point { coordinates } => push_sample(coordinates, samples),
        Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
            for position in coordinates {
                push_sample(position, samples);
            }
        }
        Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
            for ring in coordinates {
                for position in ring {
                    push_sample(position, samples);
                }
            }
        }
        Geometry::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                for ring in polygon {
                    for position in ring {
                        push_sample(position, samples);
                    }
                }
            }
        }
        Geometry::GeometryCollection { geometries } => {
            for member in geometries {
                collect_samples(member, samples);
            }
        }
    }
}

fn push_sample(position: &[f64], samples: &mut Vec<[f64; 3]>) {
    if position.len() >= 2 {
        let elevation = position.get(2).copied().unwrap_or(0.0);
        samples.push([position[0], position[1], elevation]);
    }
}

/// Planar centroid in projected coordinates.
fn centroid(geometry: &Geometry) -> Option<[f64; 2]> {
    let geo_geometry = to_geo(geometry)?;
    let point = geo_geometry.centroid()?;
    Some([point.x(), point.y()])
}

fn to_geo(geometry: &Geometry) -> Option<geo::Geometry<f64>> {
    match geometry {
        Geometry::Point { coordinates } => {
            let (x, y) = pair(coordinates)?;
            Some(geo::Geometry::Point(geo::Point::new(x, y)))
        }
        Geometry::MultiPoint { coordinates } => Some(geo::Geometry::MultiPoint(
            coordinates
                .iter()
                .filter_map(|c| pair(c))
                .map(|(x, y)| geo::Point::new(x, y))
                .collect(),
        )),
        Geometry::LineString { coordinates } => {
            Some(geo::Geometry::LineString(line_string(coordinates)))
        }
        Geometry::MultiLineString { coordinates } => Some(geo::Geometry::MultiLineString(
            geo::MultiLineString::new(coordinates.iter().map(|l| line_string(l)).collect()),
        )),
        Geometry::Polygon { coordinates } => Some(geo::Geometry::Polygon(polygon(coordinates))),
        Geometry::MultiPolygon { coordinates } => Some(geo::Geometry::MultiPolygon(
            geo::MultiPolygon::new(coordinates.iter().map(|p| polygon(p)).collect()),
        )),
        Geometry::GeometryCollection { geometries } => {
            let members: Vec<geo::Geometry<f64>> = geometries.iter().filter_map(to_geo).collect();
            if members.is_empty() {
                None
            } else {
                Some(geo::Geometry::GeometryCollection(
                    geo::GeometryCollection::from(members),
                ))
            }
        }
    }
}

fn pair(position: &[f64]) -> Option<(f64, f64)> {
    if position.len() >= 2 {
        Some((position[0], position[1]))
    } else {
        None
    }
}

fn line_string(positions: &[Vec<f64>]) -> geo::LineString<f64> {
    geo::LineString::from(
        positions
            .iter()
            .filter_map(|p| pair(p))
            .collect::<Vec<(f64, f64)>>(),
    )
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> geo::Polygon<f64> {
    let exterior = rings
        .first()
        .map(|r| line_string(r))
        .unwrap_or_else(|| geo::LineString::new(Vec::new()));
    let interiors = rings
        .iter()
        .skip(1)
        .map(|r| line_string(r))
        .collect();
    geo::Polygon::new(exterior, interiors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TwinConfig;
    use serde_json::json;

    fn world_at_null_island() -> TwinWorld {
        TwinWorld::new(TwinConfig {
            center_lng: 0.0,
            center_lat: 0.0,
            ..TwinConfig::default()
        })
    }

    fn unit_square_feature(properties: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": properties,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [0.0, 0.0], [0.001, 0.0], [0.001, 0.001], [0.0, 0.001], [0.0, 0.0]
                ]]
            }
        })
    }

    #[test]
    fn square_polygon_becomes_one_extruded_object() {
        let mut world = world_at_null_island();
        let request = LoadRequest::parse(
            "buildings",
            "EXTRUDE",
            unit_square_feature(json!({ "depth": 5.0 })),
            json!({ "depth": 2.0 }),
        )
        .unwrap();

        let payload = build_layer(&mut world, request, None).unwrap().unwrap();
        assert_eq!(payload.objects.len(), 1);

        let mesh = payload.objects[0].geometry.as_ref().unwrap();
        assert!(mesh.has_data);

        // Feature depth wins over the layer default.
        let max_z = mesh
            .positions
            .chunks_exact(3)
            .map(|v| v[2])
            .fold(f32::MIN, f32::max);
        assert_eq!(max_z, 5.0);
    }

    #[test]
    fn multi_polygon_yields_one_object_per_member() {
        let mut world = world_at_null_island();
        let document = json!({
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[0.0, 0.0], [0.001, 0.0], [0.001, 0.001], [0.0, 0.0]]],
                    [[[0.01, 0.0], [0.011, 0.0], [0.011, 0.001], [0.01, 0.0]]],
                    [[[0.02, 0.0], [0.021, 0.0], [0.021, 0.001], [0.02, 0.0]]]
                ]
            }
        });
        let request = LoadRequest::parse("islands", "EXTRUDE", document, json!({})).unwrap();

        let payload = build_layer(&mut world, request, None).unwrap().unwrap();
        assert_eq!(payload.objects.len(), 3);
    }

    #[test]
    fn model_feature_without_url_fails_the_load() {
        let mut world = world_at_null_island();
        let document = json!({
            "type": "Feature",
            "properties": {},
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        });
        let request = LoadRequest::parse("statues", "MODEL", document, json!({})).unwrap();

        assert!(matches!(
            build_layer(&mut world, request, None),
            Err(TwinError::InvalidInput(_))
        ));
    }

    #[test]
    fn model_anchors_at_the_feature_centroid() {
        let mut world = world_at_null_island();
        let document = json!({
            "type": "Feature",
            "properties": { "url": "assets/tree.glb" },
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        });
        let request = LoadRequest::parse("trees", "GLTF", document, json!({ "scale": 3.0 })).unwrap();

        let payload = build_layer(&mut world, request, None).unwrap().unwrap();
        assert_eq!(payload.objects.len(), 1);

        let placement = payload.objects[0].model.as_ref().unwrap();
        assert_eq!(placement.url, "assets/tree.glb");
        assert_eq!(placement.scale, 3.0);
        assert!(placement.position[0].abs() < 1e-6);
        assert!(placement.position[2].abs() < 1e-6);
    }

    #[test]
    fn cancelled_token_aborts_before_any_work() {
        let mut world = world_at_null_island();
        let token = CancellationToken::new("buildings".to_string());
        token.cancel();

        let request = LoadRequest::parse(
            "buildings",
            "EXTRUDE",
            unit_square_feature(json!({})),
            json!({}),
        )
        .unwrap();

        assert!(matches!(
            build_layer(&mut world, request, Some(&token)),
            Err(TwinError::Cancelled(_))
        ));
    }

    #[test]
    fn unknown_geometry_type_aborts_the_load() {
        let mut world = world_at_null_island();
        let document = json!({
            "type": "Feature",
            "properties": {},
            "geometry": { "type": "Circle", "coordinates": [0.0, 0.0] }
        });
        let request = LoadRequest::parse("weird", "EXTRUDE", document, json!({})).unwrap();

        assert!(matches!(
            build_layer(&mut world, request, None),
            Err(TwinError::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn collection_without_features_is_nothing_to_do() {
        let mut world = world_at_null_island();
        let before = world.stats();

        let request = LoadRequest::parse(
            "empty",
            "EXTRUDE",
            json!({ "type": "FeatureCollection" }),
            json!({}),
        )
        .unwrap();
        assert!(build_layer(&mut world, request, None).unwrap().is_none());

        let request = LoadRequest::parse(
            "empty",
            "EXTRUDE",
            json!({ "type": "FeatureCollection", "features": [] }),
            json!({}),
        )
        .unwrap();
        assert!(build_layer(&mut world, request, None).unwrap().is_none());

        let after = world.stats();
        assert_eq!(after.layer_count, before.layer_count);
        assert_eq!(after.events_pending, before.events_pending);
    }

    #[test]
    fn empty_dem_collection_is_not_an_error() {
        let mut world = world_at_null_island();
        let request = LoadRequest::parse(
            "terrain",
            "DEM",
            json!({ "type": "FeatureCollection", "features": [] }),
            json!({}),
        )
        .unwrap();
        assert!(build_layer(&mut world, request, None).unwrap().is_none());
    }

    #[test]
    fn dem_point_cloud_becomes_a_terrain_mesh() {
        let mut world = world_at_null_island();
        let document = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Point", "coordinates": [0.0, 0.0, 10.0] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Point", "coordinates": [0.01, 0.0, 20.0] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Point", "coordinates": [0.01, 0.01, 15.0] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Point", "coordinates": [0.0, 0.01, 5.0] } }
            ]
        });
        let request = LoadRequest::parse("terrain", "DEM", document, json!({})).unwrap();

        let payload = build_layer(&mut world, request, None).unwrap().unwrap();
        assert_eq!(payload.objects.len(), 1);
        let mesh = payload.objects[0].geometry.as_ref().unwrap();
        assert_eq!(mesh.vertex_count(), 4);
    }
}
