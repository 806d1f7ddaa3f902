use thiserror::Error;
use wasm_bindgen::JsValue;

/// Error taxonomy for the twin core.
///
/// Input validation failures abort the current load call; resource load
/// failures are logged and leave the corresponding visual element absent.
#[derive(Error, Debug)]
pub enum TwinError {
    #[error("unsupported GeoJSON type: {0}")]
    UnsupportedGeometry(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("instanced layer capacity exceeded: {requested} placements, capacity {capacity}")]
    InstanceCapacity { requested: usize, capacity: usize },

    #[error("operation for layer '{0}' was cancelled")]
    Cancelled(String),

    #[error("triangulation failed: {0}")]
    Triangulation(String),

    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl From<TwinError> for JsValue {
    fn from(err: TwinError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}
