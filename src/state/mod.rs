pub mod bus;
pub mod room;

use std::sync::Arc;

use crate::{
    catalog::Catalog,
    config::AppConfig,
    scheduler::Scheduler,
    store::{MemoryStore, RoomStore, StateStore},
};

pub use self::bus::EventBus;

pub type SharedState = Arc<AppState>;

/// Central application state: store handle, event bus, scheduler, catalog.
pub struct AppState {
    config: AppConfig,
    store: RoomStore,
    bus: EventBus,
    scheduler: Scheduler,
    catalog: Catalog,
}

impl AppState {
    /// Construct the shared state with the in-process TTL store backend.
    pub fn new(config: AppConfig, catalog: Catalog) -> SharedState {
        let backend: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        Self::with_backend(config, catalog, backend)
    }

    /// Construct with an explicit store backend (used by tests).
    pub fn with_backend(
        config: AppConfig,
        catalog: Catalog,
        backend: Arc<dyn StateStore>,
    ) -> SharedState {
        let store = RoomStore::new(backend, config.room_ttl);
        let bus = EventBus::new(config.bus_capacity);
        Arc::new(Self {
            config,
            store,
            bus,
            scheduler: Scheduler::new(),
            catalog,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> SharedState {
    AppState::new(
        AppConfig::default(),
        Catalog::embedded().expect("seed parses"),
    )
}
