//! Request handlers, grouped by resource.

pub mod editor;
pub mod modifications;
pub mod uploads;

use navlens_core::auth::{authorize, AuthDecision, AuthMethod, SessionIdentity, SignedRequest};
use navlens_core::types::now_millis;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Run editor authorization for `request`, turning a denial into an error.
pub(crate) async fn authorize_request(
    state: &AppState,
    session: Option<&SessionIdentity>,
    request: &SignedRequest,
) -> AppResult<AuthMethod> {
    let decision = authorize(
        state.store.as_ref(),
        &state.config.editor_signing_secret,
        session,
        request,
        now_millis(),
    )
    .await?;
    match decision {
        AuthDecision::Authorized { via } => Ok(via),
        AuthDecision::Denied(denial) => Err(AppError::Denied(denial)),
    }
}

/// Accept an epoch-millisecond timestamp sent as a JSON number or a numeric
/// string.
pub(crate) fn timestamp_from_json(value: Option<&serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        serde_json::Value::String(s) => timestamp_from_str(s),
        _ => None,
    }
}

pub(crate) fn timestamp_from_str(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}
