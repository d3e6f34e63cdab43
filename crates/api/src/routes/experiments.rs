//! Dashboard routes under `/experiments`.

use axum::routing::post;
use axum::Router;

use crate::handlers::editor;
use crate::state::AppState;

/// ```text
/// POST /{id}/editor-link   -> create_link (session required)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/editor-link", post(editor::create_link))
}
