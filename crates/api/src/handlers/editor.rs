//! Handlers for opening the visual editor: minting signed editor links from
//! the dashboard and verifying them when the overlay activates.

use axum::extract::{Path, State};
use axum::Json;
use navlens_core::activation::{ActivationError, EditorLink};
use navlens_core::auth::{AuthDenial, SignedRequest};
use navlens_core::editor_token::{
    check_token, generate_editor_token, hash_editor_token, new_token_record, TokenUse,
};
use navlens_core::error::CoreError;
use navlens_core::signature::sign;
use navlens_core::store::{EditorTokenStore, OwnershipDirectory};
use navlens_core::types::{now_millis, Timestamp};
use serde::{Deserialize, Serialize};

use super::{authorize_request, timestamp_from_json};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::SessionUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub experiment_id: Option<String>,
    pub site_id: Option<String>,
    pub variant_id: Option<String>,
    pub timestamp: Option<serde_json::Value>,
    pub signature: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    pub experiment_id: String,
    pub variant_id: String,
}

/// POST /api/v1/editor/verify
///
/// Checks the link signature and the one-time token it was minted with. A
/// reused token is accepted and logged.
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> AppResult<Json<DataResponse<VerifyResponse>>> {
    let request = SignedRequest {
        experiment_id: body.experiment_id.clone(),
        site_id: body.site_id.clone(),
        variant_id: body.variant_id.clone(),
        timestamp: timestamp_from_json(body.timestamp.as_ref()),
        signature: body.signature.clone(),
    }
    .trimmed();
    let token = body
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Denied(AuthDenial::MissingFields))?;

    authorize_request(&state, None, &request).await?;
    let experiment_id = request.experiment_id.unwrap_or_default();
    let variant_id = request.variant_id.unwrap_or_default();

    let token_hash = hash_editor_token(token);
    let record = state.store.find_token(&token_hash).await?;
    let token_use = check_token(
        record.as_ref(),
        &experiment_id,
        &variant_id,
        chrono::Utc::now(),
    )
    .inspect_err(|denial| {
        tracing::warn!(%experiment_id, reason = denial.code(), "Editor token rejected");
    })?;

    match token_use {
        TokenUse::First => {
            if !state.store.mark_token_used(&token_hash).await? {
                tracing::warn!(%experiment_id, %variant_id, "Editor token used concurrently");
            }
        }
        TokenUse::Reused => {
            tracing::warn!(%experiment_id, %variant_id, "Editor token reused");
        }
    }

    tracing::info!(%experiment_id, %variant_id, "Editor session verified");
    Ok(Json(DataResponse {
        data: VerifyResponse {
            valid: true,
            experiment_id,
            variant_id,
        },
    }))
}

// ---------------------------------------------------------------------------
// Editor link
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorLinkRequest {
    pub variant_id: String,
    pub page_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorLinkResponse {
    pub url: String,
    pub expires_at: Timestamp,
}

/// POST /api/v1/experiments/{id}/editor-link
///
/// The session user must own the experiment's site.
pub async fn create_link(
    State(state): State<AppState>,
    user: SessionUser,
    Path(experiment_id): Path<String>,
    Json(body): Json<EditorLinkRequest>,
) -> AppResult<Json<DataResponse<EditorLinkResponse>>> {
    let experiment = state
        .store
        .experiment(&experiment_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Experiment",
            id: experiment_id.clone(),
        })?;

    let owner = state.store.site_owner(&experiment.site_id).await?;
    if owner.as_deref() != Some(user.user_id.as_str()) {
        return Err(CoreError::Forbidden("Not authorized for this experiment".into()).into());
    }

    let variant_experiment = state.store.variant_experiment(&body.variant_id).await?;
    if variant_experiment.as_deref() != Some(experiment_id.as_str()) {
        return Err(CoreError::NotFound {
            entity: "Variant",
            id: body.variant_id.clone(),
        }
        .into());
    }

    let token = generate_editor_token();
    let record = new_token_record(
        &token,
        &experiment_id,
        &body.variant_id,
        &user.user_id,
        chrono::Utc::now(),
    );

    let timestamp = now_millis();
    let link = EditorLink {
        experiment_id: experiment_id.clone(),
        variant_id: body.variant_id.clone(),
        timestamp,
        token: token.plaintext,
        signature: sign(
            &state.config.editor_signing_secret,
            &experiment_id,
            &body.variant_id,
            timestamp,
        ),
    };
    let url = link.to_url(&body.page_url).map_err(|e| match e {
        ActivationError::InvalidUrl(msg) => CoreError::Validation(format!("Invalid pageUrl: {msg}")),
        other => CoreError::Internal(other.to_string()),
    })?;

    state.store.insert_token(&record).await?;
    tracing::info!(
        %experiment_id,
        variant_id = %body.variant_id,
        user_id = %user.user_id,
        "Minted editor link"
    );

    Ok(Json(DataResponse {
        data: EditorLinkResponse {
            url,
            expires_at: record.expires_at,
        },
    }))
}
