pub mod editor;
pub mod experiments;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Routes the editor overlay calls from arbitrary customer origins.
///
/// ```text
/// /modifications             load, save
/// /uploads                   image upload
/// /editor/verify             verify signed link + one-time token
/// ```
pub fn editor_routes(max_upload_bytes: usize) -> Router<AppState> {
    editor::router(max_upload_bytes)
}

/// Routes the dashboard calls with its session.
///
/// ```text
/// /experiments/{id}/editor-link    mint a signed editor link
/// ```
pub fn dashboard_routes() -> Router<AppState> {
    Router::new().nest("/experiments", experiments::router())
}
