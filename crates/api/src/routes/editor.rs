//! Routes called by the editor overlay from customer pages.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{editor, modifications, uploads};
use crate::state::AppState;

/// ```text
/// GET  /modifications    -> load    (?experimentId&siteId&variantId&ts&sig)
/// POST /modifications    -> save
/// POST /uploads          -> upload  (multipart)
/// POST /editor/verify    -> verify
/// ```
///
/// The upload route's body limit is the configured file size plus room for
/// the form's other fields.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/modifications",
            get(modifications::load).post(modifications::save),
        )
        .route(
            "/uploads",
            post(uploads::upload).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(uploads::FORM_OVERHEAD_BYTES),
            )),
        )
        .route("/editor/verify", post(editor::verify))
}
