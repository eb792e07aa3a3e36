//! API handlers for the APK Depot.

pub mod apk;

pub use apk::*;

use std::sync::Arc;

use crate::depot::Depot;

/// Shared depot handle.
pub type SharedDepot = Arc<Depot>;

/// Application state shared by all handlers.
pub struct AppState {
    /// The depot service.
    pub depot: SharedDepot,
}

impl AppState {
    /// Create a new application state.
    pub fn new(depot: SharedDepot) -> Self {
        Self { depot }
    }
}
