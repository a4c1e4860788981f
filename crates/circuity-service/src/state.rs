//! Application state for the circuity HTTP service.
//!
//! Holds the explicitly constructed, lifetime-scoped service handles (the
//! calculation store and routing client) that handlers receive through axum's
//! `State` extractor rather than ambient globals.

use std::sync::Arc;

use circuity_lib::{CalculationStore, RoutingClient};

/// Shared application state for all axum handlers.
///
/// Cheaply cloneable (`Arc` internally); the accessors hand out clones so
/// handlers can move the handles into blocking tasks.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: CalculationStore,
    routing: RoutingClient,
}

impl AppState {
    /// Build state from pre-constructed service handles.
    pub fn new(store: CalculationStore, routing: RoutingClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner { store, routing }),
        }
    }

    /// Handle to the calculation store.
    pub fn store(&self) -> CalculationStore {
        self.inner.store.clone()
    }

    /// Handle to the routing client.
    pub fn routing(&self) -> RoutingClient {
        self.inner.routing.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
