// Shared data model for the twin core: configuration, layer records, scene
// payloads and stats. All serde types so they cross the wasm boundary via
// serde-wasm-bindgen without touching JsValue internally.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TwinError;
use crate::geometry::BufferGeometry;
use crate::material::MaterialDescriptor;

/// World configuration supplied at initialization. The center coordinate is
/// projected once to become the scene origin.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwinConfig {
    #[serde(default = "default_center_lng")]
    pub center_lng: f64,
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
}

fn default_center_lng() -> f64 {
    -8.7016652234108349
}

fn default_center_lat() -> f64 {
    41.185523935676713
}

impl Default for TwinConfig {
    fn default() -> Self {
        TwinConfig {
            center_lng: default_center_lng(),
            center_lat: default_center_lat(),
        }
    }
}

/// How a layer's features are turned into scene content.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Extrude,
    Model,
    Gltf,
    Dem,
}

impl FromStr for LayerKind {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXTRUDE" | "OCEAN" => Ok(LayerKind::Extrude),
            "MODEL" => Ok(LayerKind::Model),
            "GLTF" => Ok(LayerKind::Gltf),
            "DEM" => Ok(LayerKind::Dem),
            other => Err(TwinError::InvalidInput(format!(
                "unknown layer kind '{other}'"
            ))),
        }
    }
}

/// One renderable object produced by a layer load. `geometry` is populated
/// for mesh kinds; `model` for model-placement kinds.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub id: String,
    pub layer_id: String,
    pub geometry: Option<BufferGeometry>,
    pub material: MaterialDescriptor,
    pub model: Option<ModelPlacement>,
    pub properties: serde_json::Value,
}

/// Everything a host needs to realize one loaded layer.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScenePayload {
    pub layer_id: String,
    pub objects: Vec<SceneObject>,
}

/// Anchor record for a model placed at a feature's centroid. The host loads
/// and positions the asset; the core only resolves where it goes.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelPlacement {
    pub url: String,
    /// Host-space position relative to the scene origin.
    pub position: [f64; 3],
    pub rotation_y: f64,
    pub scale: f64,
}

/// Counters surfaced for debugging and tests.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorldStats {
    pub layer_count: usize,
    pub object_count: usize,
    pub events_pending: usize,
    pub loads_cancelled: usize,
}

/// Shallow merge of layer defaults under a feature's own properties. Feature
/// keys win, matching how hosts override per-feature styling.
pub fn merge_properties(
    layer: &serde_json::Value,
    feature: &serde_json::Value,
) -> serde_json::Value {
    let mut merged = serde_json::Map::new();

    if let Some(base) = layer.as_object() {
        for (key, value) in base {
            merged.insert(key.clone(), value.clone());
        }
    }
    if let Some(overrides) = feature.as_object() {
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
    }

    serde_json::Value::Object(merged)
}
