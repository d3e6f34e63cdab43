//! Authorization for reading and writing a variant's modifications.
//!
//! Two attempts, in order:
//!
//! 1. **Session**: a resolved dashboard identity that owns the site owning the
//!    experiment (and the variant belongs to that experiment).
//! 2. **Signature**: all signed fields present, signature matches, timestamp
//!    inside the one-hour window, experiment belongs to the claimed site and
//!    variant belongs to the experiment.
//!
//! A denial carries only its category, never which value was wrong.

use crate::error::CoreError;
use crate::signature::{verify_signature, within_window};
use crate::store::OwnershipDirectory;
use crate::types::EpochMillis;

/// Why a request was denied. Messages are deliberately generic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthDenial {
    #[error("Missing authorization fields")]
    MissingFields,
    #[error("Authorization expired")]
    Expired,
    #[error("Invalid signature")]
    SignatureMismatch,
    #[error("Not authorized for this experiment")]
    OwnershipMismatch,
}

impl AuthDenial {
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::Expired => "expired",
            Self::SignatureMismatch => "signature_mismatch",
            Self::OwnershipMismatch => "ownership_mismatch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    Signature,
}

/// Terminal state of [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized { via: AuthMethod },
    Denied(AuthDenial),
}

impl AuthDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized { .. })
    }
}

/// A dashboard user resolved from the request's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
}

/// Authorization fields as supplied by the caller (query string or body).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedRequest {
    pub experiment_id: Option<String>,
    pub site_id: Option<String>,
    pub variant_id: Option<String>,
    pub timestamp: Option<EpochMillis>,
    pub signature: Option<String>,
}

impl SignedRequest {
    /// Copy with surrounding whitespace removed; blank fields become `None`.
    /// Handlers authorize and then act on this same copy.
    pub fn trimmed(&self) -> Self {
        let trim = |value: &Option<String>| present(value).map(str::to_string);
        Self {
            experiment_id: trim(&self.experiment_id),
            site_id: trim(&self.site_id),
            variant_id: trim(&self.variant_id),
            timestamp: self.timestamp,
            signature: trim(&self.signature),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Run the authorization state machine. Store failures are returned as
/// errors, never converted into a decision.
pub async fn authorize<D: OwnershipDirectory + ?Sized>(
    directory: &D,
    secret: &str,
    session: Option<&SessionIdentity>,
    request: &SignedRequest,
    now: EpochMillis,
) -> Result<AuthDecision, CoreError> {
    if let Some(identity) = session {
        if session_owns(directory, identity, request).await? {
            return Ok(AuthDecision::Authorized {
                via: AuthMethod::Session,
            });
        }
        tracing::debug!(
            user_id = %identity.user_id,
            "Session does not own experiment, trying signature"
        );
    }

    let decision = match signature_attempt(directory, secret, request, now).await? {
        None => AuthDecision::Authorized {
            via: AuthMethod::Signature,
        },
        Some(denial) => {
            tracing::warn!(
                reason = denial.code(),
                experiment_id = ?request.experiment_id,
                "Authorization denied"
            );
            AuthDecision::Denied(denial)
        }
    };
    Ok(decision)
}

async fn session_owns<D: OwnershipDirectory + ?Sized>(
    directory: &D,
    identity: &SessionIdentity,
    request: &SignedRequest,
) -> Result<bool, CoreError> {
    let (Some(experiment_id), Some(variant_id)) =
        (present(&request.experiment_id), present(&request.variant_id))
    else {
        return Ok(false);
    };
    let Some(experiment) = directory.experiment(experiment_id).await? else {
        return Ok(false);
    };
    if present(&request.site_id).is_some_and(|site| site != experiment.site_id) {
        return Ok(false);
    }
    if directory.site_owner(&experiment.site_id).await?.as_deref()
        != Some(identity.user_id.as_str())
    {
        return Ok(false);
    }
    Ok(directory.variant_experiment(variant_id).await?.as_deref() == Some(experiment_id))
}

/// `None` when authorized, otherwise the first failing check.
async fn signature_attempt<D: OwnershipDirectory + ?Sized>(
    directory: &D,
    secret: &str,
    request: &SignedRequest,
    now: EpochMillis,
) -> Result<Option<AuthDenial>, CoreError> {
    let (Some(experiment_id), Some(site_id), Some(variant_id), Some(timestamp), Some(signature)) = (
        present(&request.experiment_id),
        present(&request.site_id),
        present(&request.variant_id),
        request.timestamp,
        present(&request.signature),
    ) else {
        return Ok(Some(AuthDenial::MissingFields));
    };

    if !verify_signature(secret, experiment_id, variant_id, timestamp, signature) {
        return Ok(Some(AuthDenial::SignatureMismatch));
    }
    if !within_window(timestamp, now) {
        return Ok(Some(AuthDenial::Expired));
    }

    let experiment_site = directory
        .experiment(experiment_id)
        .await?
        .map(|experiment| experiment.site_id);
    if experiment_site.as_deref() != Some(site_id) {
        return Ok(Some(AuthDenial::OwnershipMismatch));
    }
    if directory.variant_experiment(variant_id).await?.as_deref() != Some(experiment_id) {
        return Ok(Some(AuthDenial::OwnershipMismatch));
    }
    Ok(None)
}
