//! Handlers for `/modifications`: load and save a variant's modification
//! array.

use axum::extract::{Query, State};
use axum::Json;
use navlens_core::auth::SignedRequest;
use navlens_core::modification::Modification;
use navlens_core::sanitize::sanitize_untrusted;
use navlens_core::store::{OwnershipDirectory, VariantStore};
use serde::{Deserialize, Serialize};

use super::{authorize_request, timestamp_from_json, timestamp_from_str};
use crate::error::AppResult;
use crate::middleware::auth::OptionalSession;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for loading. `ts` and `sig` are the signed-link fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadQuery {
    pub experiment_id: Option<String>,
    pub site_id: Option<String>,
    pub variant_id: Option<String>,
    pub ts: Option<String>,
    pub sig: Option<String>,
}

impl LoadQuery {
    fn signed_request(&self) -> SignedRequest {
        SignedRequest {
            experiment_id: self.experiment_id.clone(),
            site_id: self.site_id.clone(),
            variant_id: self.variant_id.clone(),
            timestamp: self.ts.as_deref().and_then(timestamp_from_str),
            signature: self.sig.clone(),
        }
        .trimmed()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub experiment_id: Option<String>,
    pub site_id: Option<String>,
    pub variant_id: Option<String>,
    /// Untrusted; decoded leniently and sanitized before persisting.
    #[serde(default)]
    pub modifications: Vec<serde_json::Value>,
    pub timestamp: Option<serde_json::Value>,
    pub signature: Option<String>,
}

impl SaveRequest {
    fn signed_request(&self) -> SignedRequest {
        SignedRequest {
            experiment_id: self.experiment_id.clone(),
            site_id: self.site_id.clone(),
            variant_id: self.variant_id.clone(),
            timestamp: timestamp_from_json(self.timestamp.as_ref()),
            signature: self.signature.clone(),
        }
        .trimmed()
    }
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub modifications: Vec<Modification>,
    pub count: usize,
}

/// GET /api/v1/modifications
///
/// Stored entries are re-sanitized on every read and stamped with the
/// variant they were loaded for.
pub async fn load(
    State(state): State<AppState>,
    session: OptionalSession,
    Query(query): Query<LoadQuery>,
) -> AppResult<Json<DataResponse<Vec<Modification>>>> {
    let request = query.signed_request();
    let via = authorize_request(&state, session.identity(), &request).await?;
    // Authorization only succeeds with a variant id present.
    let variant_id = request.variant_id.unwrap_or_default();

    let stored = state.store.load_modifications(&variant_id).await?;
    let modifications = assign_variant(sanitize_untrusted(&stored), &variant_id);
    tracing::debug!(
        %variant_id,
        ?via,
        count = modifications.len(),
        "Loaded modifications"
    );
    Ok(Json(DataResponse {
        data: modifications,
    }))
}

/// POST /api/v1/modifications
///
/// Replaces the variant's modification array (last write wins) and asks
/// for a config publish when the experiment is running.
pub async fn save(
    State(state): State<AppState>,
    session: OptionalSession,
    Json(body): Json<SaveRequest>,
) -> AppResult<Json<DataResponse<SaveResponse>>> {
    let request = body.signed_request();
    let via = authorize_request(&state, session.identity(), &request).await?;
    let experiment_id = request.experiment_id.unwrap_or_default();
    let variant_id = request.variant_id.unwrap_or_default();

    let modifications = assign_variant(sanitize_untrusted(&body.modifications), &variant_id);
    state
        .store
        .save_modifications(&variant_id, &modifications)
        .await?;
    tracing::info!(
        %experiment_id,
        %variant_id,
        ?via,
        count = modifications.len(),
        "Saved modifications"
    );

    publish_if_running(&state, &experiment_id).await;

    let count = modifications.len();
    Ok(Json(DataResponse {
        data: SaveResponse {
            modifications,
            count,
        },
    }))
}

/// Every entry belongs to the authorized variant, whatever the client sent.
fn assign_variant(mut modifications: Vec<Modification>, variant_id: &str) -> Vec<Modification> {
    for modification in &mut modifications {
        if modification.variant_id != variant_id {
            modification.variant_id = variant_id.to_string();
        }
    }
    modifications
}

/// Publish failures are logged and never fail the save.
async fn publish_if_running(state: &AppState, experiment_id: &str) {
    let experiment = match state.store.experiment(experiment_id).await {
        Ok(Some(experiment)) => experiment,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(%experiment_id, error = %e, "Failed to look up experiment for publish");
            return;
        }
    };
    if !experiment.is_running() {
        return;
    }
    match state
        .publisher
        .publish(&experiment.id, &experiment.site_id)
        .await
    {
        Ok(()) => tracing::info!(%experiment_id, "Published experiment config"),
        Err(e) => tracing::error!(%experiment_id, error = %e, "Config publish failed"),
    }
}
