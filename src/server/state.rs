use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::ops::{OperationRegistry, render};
use crate::storage::Storage;

/// Shared application state accessible to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs operations against the registry and storage.
    pub dispatcher: Dispatcher,

    /// Configuration
    pub config: Arc<Config>,

    /// Whether pdfium could be loaded, reported by `/api/status`.
    pub renderer_available: bool,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, config: Config) -> Self {
        let registry = Arc::new(OperationRegistry::builtin());
        Self {
            dispatcher: Dispatcher::new(registry, storage),
            config: Arc::new(config),
            renderer_available: render::renderer_available(),
        }
    }

    /// Override the detected renderer availability.
    pub fn with_renderer(mut self, available: bool) -> Self {
        self.renderer_available = available;
        self
    }
}
