// Per-layer cancellation tokens. A new load for a layer id cancels whatever
// load is still in flight for that id, and removing a layer cancels its load
// too, so a stale response can never resurrect a removed layer.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::error::TwinError;

pub struct CancellationToken {
    pub layer_id: String,
    is_cancelled: Arc<Mutex<bool>>,
}

impl Clone for CancellationToken {
    fn clone(&self) -> Self {
        CancellationToken {
            layer_id: self.layer_id.clone(),
            is_cancelled: Arc::clone(&self.is_cancelled),
        }
    }
}

impl CancellationToken {
    pub fn new(layer_id: String) -> Self {
        CancellationToken {
            layer_id,
            is_cancelled: Arc::new(Mutex::new(false)),
        }
    }

    pub fn cancel(&self) {
        *self.is_cancelled.lock() = true;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.is_cancelled.lock()
    }

    /// Checkpoint between pipeline stages; loads bail out at the first
    /// checkpoint after cancellation.
    pub fn check(&self) -> Result<(), TwinError> {
        if self.is_cancelled() {
            Err(TwinError::Cancelled(self.layer_id.clone()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct CancellationRegistry {
    tokens: HashMap<String, CancellationToken>,
}

impl CancellationRegistry {
    /// Issue a token for a layer load, cancelling any earlier token issued
    /// under the same layer id.
    pub fn begin(&mut self, layer_id: &str) -> CancellationToken {
        if let Some(previous) = self.tokens.get(layer_id) {
            previous.cancel();
        }
        let token = CancellationToken::new(layer_id.to_string());
        self.tokens.insert(layer_id.to_string(), token.clone());
        token
    }

    pub fn cancel(&mut self, layer_id: &str) -> bool {
        match self.tokens.get(layer_id) {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drop the bookkeeping for a finished load, but only if the stored
    /// token is the one that finished; a newer load keeps its own entry.
    pub fn finish(&mut self, token: &CancellationToken) {
        if let Some(stored) = self.tokens.get(&token.layer_id) {
            if Arc::ptr_eq(&stored.is_cancelled, &token.is_cancelled) {
                self.tokens.remove(&token.layer_id);
            }
        }
    }
}

lazy_static! {
    static ref CANCELLATION: Mutex<CancellationRegistry> =
        Mutex::new(CancellationRegistry::default());
}

pub fn begin_load(layer_id: &str) -> CancellationToken {
    CANCELLATION.lock().begin(layer_id)
}

pub fn cancel_load(layer_id: &str) -> bool {
    CANCELLATION.lock().cancel(layer_id)
}

pub fn finish_load(token: &CancellationToken) {
    CANCELLATION.lock().finish(token);
}
