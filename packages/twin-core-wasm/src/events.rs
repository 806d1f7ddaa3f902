// Lifecycle event queue. Events are produced during loads and drained by the
// host after each call; callbacks cannot live inside the global state, so the
// host polls instead of registering closures here.

use serde::{Deserialize, Serialize};

/// Lifecycle notifications emitted by the world.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TwinEvent {
    #[serde(rename_all = "camelCase")]
    LayerLoaded { layer_id: String, object_count: usize },
    #[serde(rename_all = "camelCase")]
    LayerRemoved { layer_id: String },
    #[serde(rename_all = "camelCase")]
    LayerFailed { layer_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    LoadCancelled { layer_id: String },
}

/// FIFO queue of pending events. Owned by the world state; subscribers drain
/// it in emission order.
#[derive(Default)]
pub struct EventQueue {
    pending: Vec<TwinEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn emit(&mut self, event: TwinEvent) {
        self.pending.push(event);
    }

    pub fn drain(&mut self) -> Vec<TwinEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
