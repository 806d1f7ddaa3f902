use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

// Create a console module for logging
pub mod console;
// Error taxonomy shared by every module
mod error;
// Lifecycle event queue
mod events;
// GeoJSON parsing and normalization
mod geojson;
// Mesh buffer container and helpers
mod geometry;
// Material resolution from property bags
mod material;
// Shared configuration and scene records
mod models;
// EPSG:3857 projection
mod projection;
// Ring-to-shape conversion for extrusion
mod shape;
// Import our geometry functions
#[path = "../geometry_functions/extrude.rs"]
pub mod extrude;
// Cancellation handling for in-flight loads
mod cancellation;
// Terrain triangulation
mod dem;
// Instanced placement transforms
mod instanced;
// The layer build pipeline
mod loader;
// Global world state
mod world;

use error::TwinError;
use events::TwinEvent;
use instanced::{build_instances, InstanceAnchor};
use loader::{build_layer, LoadRequest};
use models::TwinConfig;
use world::TwinWorld;

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

#[wasm_bindgen]
extern "C" {
    // JavaScript function to fetch data from URL
    #[wasm_bindgen(js_namespace = wasmJsHelpers, catch)]
    pub fn fetch(url: &str) -> Result<js_sys::Promise, JsValue>;
}

// Use the macro from our console module
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => (crate::console::log(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("twin core initialized");
    });
}

/// Configure the world. Drops any loaded layers because their geometry is
/// expressed against the previous scene origin. A missing config keeps the
/// built-in defaults.
#[wasm_bindgen]
pub fn init_world(config: JsValue) -> Result<(), JsValue> {
    let config: TwinConfig = if config.is_null() || config.is_undefined() {
        TwinConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&e.to_string()))?
    };

    TwinWorld::with_mut(|world| world.reset(config));
    Ok(())
}

/// Load a layer from an in-memory GeoJSON document. A null or undefined
/// document is a silent no-op. Returns the scene payload for the host to
/// realize, or null when nothing was loaded.
#[wasm_bindgen]
pub fn load_layer(
    layer_id: &str,
    kind: &str,
    geojson: JsValue,
    properties: JsValue,
) -> Result<JsValue, JsValue> {
    if geojson.is_null() || geojson.is_undefined() {
        return Ok(JsValue::NULL);
    }

    let document: serde_json::Value =
        serde_wasm_bindgen::from_value(geojson).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let properties = parse_properties(properties)?;

    install_from_document(layer_id, kind, document, properties)
}

/// Load a layer by fetching its GeoJSON from a URL. The fetch helper resolves
/// to the response body text. A load started later for the same layer id
/// cancels this one.
#[wasm_bindgen]
pub async fn load_layer_from_url(
    layer_id: String,
    kind: String,
    url: String,
    properties: JsValue,
) -> Result<JsValue, JsValue> {
    let properties = parse_properties(properties)?;

    let token = cancellation::begin_load(&layer_id);

    let promise = fetch(&url)?;
    let response = JsFuture::from(promise)
        .await
        .map_err(|e| JsValue::from(TwinError::Fetch(format!("{url}: {:?}", e.as_string()))))?;

    // The response may race with a removal or a newer load.
    if token.is_cancelled() {
        return Ok(on_cancelled(&layer_id));
    }

    let body = response
        .as_string()
        .ok_or_else(|| JsValue::from(TwinError::Fetch(format!("{url}: body is not text"))))?;
    let document: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| JsValue::from(TwinError::InvalidInput(e.to_string())))?;

    let result = TwinWorld::with_mut(|world| {
        let request = LoadRequest::parse(&layer_id, &kind, document, properties)?;
        let payload = build_layer(world, request, Some(&token))?;
        if let Some(payload) = &payload {
            world.install_layer(payload.clone());
        }
        Ok::<_, TwinError>(payload)
    });

    cancellation::finish_load(&token);

    match result {
        Ok(Some(payload)) => {
            serde_wasm_bindgen::to_value(&payload).map_err(|e| JsValue::from_str(&e.to_string()))
        }
        // An empty feature list is nothing to do.
        Ok(None) => Ok(JsValue::NULL),
        Err(TwinError::Cancelled(_)) => Ok(on_cancelled(&layer_id)),
        Err(err) => {
            report_failure(&layer_id, &err);
            Err(err.into())
        }
    }
}

fn parse_properties(properties: JsValue) -> Result<serde_json::Value, JsValue> {
    if properties.is_null() || properties.is_undefined() {
        Ok(serde_json::json!({}))
    } else {
        serde_wasm_bindgen::from_value(properties).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn install_from_document(
    layer_id: &str,
    kind: &str,
    document: serde_json::Value,
    properties: serde_json::Value,
) -> Result<JsValue, JsValue> {
    let token = cancellation::begin_load(layer_id);

    let result = TwinWorld::with_mut(|world| {
        let request = LoadRequest::parse(layer_id, kind, document, properties)?;
        let payload = build_layer(world, request, Some(&token))?;
        if let Some(payload) = &payload {
            world.install_layer(payload.clone());
        }
        Ok::<_, TwinError>(payload)
    });

    cancellation::finish_load(&token);

    match result {
        Ok(Some(payload)) => {
            serde_wasm_bindgen::to_value(&payload).map_err(|e| JsValue::from_str(&e.to_string()))
        }
        // An empty feature list is nothing to do.
        Ok(None) => Ok(JsValue::NULL),
        Err(TwinError::Cancelled(_)) => Ok(on_cancelled(layer_id)),
        Err(err) => {
            report_failure(layer_id, &err);
            Err(err.into())
        }
    }
}

fn on_cancelled(layer_id: &str) -> JsValue {
    console_log!("load of layer '{}' cancelled", layer_id);
    TwinWorld::with_mut(|world| {
        world.loads_cancelled += 1;
        world.events.emit(TwinEvent::LoadCancelled {
            layer_id: layer_id.to_string(),
        });
    });
    JsValue::NULL
}

fn report_failure(layer_id: &str, err: &TwinError) {
    console_log!("load of layer '{}' failed: {}", layer_id, err);
    TwinWorld::with_mut(|world| {
        world.events.emit(TwinEvent::LayerFailed {
            layer_id: layer_id.to_string(),
            message: err.to_string(),
        });
    });
}

/// Remove a layer and cancel its in-flight load, if any. Unknown layer ids
/// are a silent no-op. Returns whether a loaded layer was removed.
#[wasm_bindgen]
pub fn remove_layer(layer_id: &str) -> bool {
    cancellation::cancel_load(layer_id);
    TwinWorld::with_mut(|world| world.remove_layer(layer_id))
}

#[wasm_bindgen]
pub fn has_layer(layer_id: &str) -> bool {
    TwinWorld::with(|world| world.has_layer(layer_id))
}

/// Resolve instance anchors into per-instance transform matrices relative to
/// the scene origin.
#[wasm_bindgen]
pub fn load_instanced(anchors: JsValue) -> Result<JsValue, JsValue> {
    let anchors: Vec<InstanceAnchor> =
        serde_wasm_bindgen::from_value(anchors).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let origin = TwinWorld::with(|world| world.origin);
    let set = build_instances(&anchors, origin).map_err(JsValue::from)?;

    serde_wasm_bindgen::to_value(&set).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Drain pending lifecycle events in emission order.
#[wasm_bindgen]
pub fn drain_events() -> Result<JsValue, JsValue> {
    let events = TwinWorld::with_mut(|world| world.events.drain());
    serde_wasm_bindgen::to_value(&events).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn get_world_stats() -> Result<JsValue, JsValue> {
    let stats = TwinWorld::with(|world| world.stats());
    serde_wasm_bindgen::to_value(&stats).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Drop every loaded layer and pending event, keeping the configuration.
#[wasm_bindgen]
pub fn clear_world() {
    TwinWorld::with_mut(|world| {
        let config = world.config.clone();
        world.reset(config);
    });
}

/// Project a single coordinate to scene-origin-relative web-mercator meters.
#[wasm_bindgen]
pub fn project_coordinate(lng: f64, lat: f64) -> Vec<f64> {
    let origin = TwinWorld::with(|world| world.origin);
    let [x, y] = projection::project_lng_lat(lng, lat);
    vec![x - origin[0], y - origin[1]]
}

/// Inverse of [`project_coordinate`]: scene-origin-relative meters back to
/// degrees, for labelling picked objects.
#[wasm_bindgen]
pub fn unproject_coordinate(x: f64, y: f64) -> Vec<f64> {
    let origin = TwinWorld::with(|world| world.origin);
    let [lng, lat] = projection::unproject(x + origin[0], y + origin[1]);
    vec![lng, lat]
}
