// Application state module
// Shared by every connection task: configuration plus the store handle

use std::sync::atomic::AtomicUsize;

use super::types::Config;
use crate::store::SharedStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    /// Connections currently being served
    pub active_connections: AtomicUsize,
}

impl AppState {
    /// Build state around an already opened store
    pub fn new(config: Config, store: SharedStore) -> Self {
        Self {
            config,
            store,
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn users_collection(&self) -> &str {
        &self.config.database.users_collection
    }

    pub fn events_collection(&self) -> &str {
        &self.config.database.events_collection
    }
}
