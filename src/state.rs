use std::sync::Arc;

use crate::router::RequestRouter;
use crate::storage::ToolStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Routes every request to the configured store
    pub router: RequestRouter,
}

impl AppState {
    /// Create new application state
    pub fn new(store: Arc<dyn ToolStore>) -> Self {
        Self {
            router: RequestRouter::new(store),
        }
    }
}
