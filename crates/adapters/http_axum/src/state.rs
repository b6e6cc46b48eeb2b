//! Shared application state for axum handlers.

use std::sync::Arc;

use relayhub_app::operations::Operations;

/// Application state shared across all axum handlers.
///
/// `Clone` is implemented manually so [`Operations`] itself does not need to
/// be `Clone`; only the `Arc` is cloned.
pub struct AppState {
    pub operations: Arc<Operations>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            operations: Arc::clone(&self.operations),
        }
    }
}

impl AppState {
    pub fn new(operations: Operations) -> Self {
        Self {
            operations: Arc::new(operations),
        }
    }
}
