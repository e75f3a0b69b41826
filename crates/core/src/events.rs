//! Refresh listeners
//!
//! Fired after a holder's derived data has been recomputed. A cache layer
//! outside the engine subscribes here to invalidate what it holds.
//!
//! # Example
//!
//! ```ignore
//! let key = engine.listeners().on_refresh(|id| {
//!     tracing::info!("{} refreshed", id);
//! });
//!
//! // Later, unregister if needed
//! engine.listeners().remove_listener(key);
//! ```

use std::sync::Arc;

use ctxperms_sdk::HolderId;
use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Key for registered listeners, used for removal
    pub struct ListenerKey;
}

/// Callback invoked with the refreshed holder's id
pub type RefreshCallback = Arc<dyn Fn(&HolderId) + Send + Sync>;

/// Registry of refresh callbacks
#[derive(Default)]
pub struct RefreshListeners {
    callbacks: RwLock<SlotMap<ListenerKey, RefreshCallback>>,
}

impl RefreshListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    ///
    /// # Returns
    /// A key that can be used to unregister the callback via `remove_listener`.
    pub fn on_refresh<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&HolderId) + Send + Sync + 'static,
    {
        self.callbacks.write().insert(Arc::new(callback))
    }

    /// Remove a listener by its key
    ///
    /// Returns `true` if the listener was found and removed.
    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        self.callbacks.write().remove(key).is_some()
    }

    /// Invoke every callback
    ///
    /// Runs on a snapshot taken outside the lock, so callbacks may register
    /// or remove listeners.
    pub(crate) fn fire(&self, id: &HolderId) {
        let callbacks: Vec<RefreshCallback> = self.callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(id);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}
