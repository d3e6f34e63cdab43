use std::sync::Arc;

use navlens_core::store::{ConfigPublisher, EditorStore};

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Variant, ownership and editor-token persistence.
    pub store: Arc<dyn EditorStore>,
    /// Notified after a running experiment's modifications change.
    pub publisher: Arc<dyn ConfigPublisher>,
    pub config: Arc<ServerConfig>,
}
