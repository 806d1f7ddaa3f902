// Global world state. Everything stored here is Send, so the state holds
// serde data only and the wasm surface converts at the boundary.

use std::cell::RefCell;
use std::collections::HashMap;

use lazy_static::lazy_static;
use parking_lot::ReentrantMutex;

use crate::events::{EventQueue, TwinEvent};
use crate::models::{ScenePayload, TwinConfig, WorldStats};
use crate::projection::project_lng_lat;

pub struct TwinWorld {
    pub config: TwinConfig,
    /// Projected scene origin in web-mercator meters.
    pub origin: [f64; 2],
    layers: HashMap<String, ScenePayload>,
    pub events: EventQueue,
    /// Per-feature depth offset counter, monotonic across loads so coplanar
    /// footprints from different layers never share an offset.
    polygon_offset: u32,
    pub loads_cancelled: usize,
}

lazy_static! {
    static ref TWIN_WORLD: ReentrantMutex<RefCell<TwinWorld>> =
        ReentrantMutex::new(RefCell::new(TwinWorld::new(TwinConfig::default())));
}

impl TwinWorld {
    pub fn new(config: TwinConfig) -> Self {
        let origin = project_lng_lat(config.center_lng, config.center_lat);
        TwinWorld {
            config,
            origin,
            layers: HashMap::new(),
            events: EventQueue::new(),
            polygon_offset: 0,
            loads_cancelled: 0,
        }
    }

    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&TwinWorld) -> R,
    {
        let guard = TWIN_WORLD.lock();
        let borrow = guard.borrow();
        f(&borrow)
    }

    pub fn with_mut<F, R>(f: F) -> R
    where
        F: FnOnce(&mut TwinWorld) -> R,
    {
        let guard = TWIN_WORLD.lock();
        let mut borrow = guard.borrow_mut();
        f(&mut borrow)
    }

    /// Reconfigure in place. Loaded layers are dropped because their
    /// geometry is expressed against the previous origin.
    pub fn reset(&mut self, config: TwinConfig) {
        self.origin = project_lng_lat(config.center_lng, config.center_lat);
        self.config = config;
        self.layers.clear();
        self.events = EventQueue::new();
        self.polygon_offset = 0;
        self.loads_cancelled = 0;
    }

    /// Register a fully built payload. Repeated loads under the same id
    /// append to the existing layer. Emits the loaded event with this
    /// load's object count.
    pub fn install_layer(&mut self, payload: ScenePayload) {
        self.events.emit(TwinEvent::LayerLoaded {
            layer_id: payload.layer_id.clone(),
            object_count: payload.objects.len(),
        });
        match self.layers.get_mut(&payload.layer_id) {
            Some(existing) => existing.objects.extend(payload.objects),
            None => {
                self.layers.insert(payload.layer_id.clone(), payload);
            }
        }
    }

    /// Remove a layer. Unknown ids are a silent no-op and emit nothing.
    pub fn remove_layer(&mut self, layer_id: &str) -> bool {
        if self.layers.remove(layer_id).is_some() {
            self.events.emit(TwinEvent::LayerRemoved {
                layer_id: layer_id.to_string(),
            });
            true
        } else {
            false
        }
    }

    pub fn has_layer(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }

    pub fn next_polygon_offset(&mut self) -> u32 {
        let offset = self.polygon_offset;
        self.polygon_offset += 1;
        offset
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            layer_count: self.layers.len(),
            object_count: self.layers.values().map(|p| p.objects.len()).sum(),
            events_pending: self.events.len(),
            loads_cancelled: self.loads_cancelled,
        }
    }
}
