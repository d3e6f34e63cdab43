//! One-time editor tokens, minted when a dashboard user opens the visual
//! editor on their site.
//!
//! The plaintext travels once in the editor URL; only its SHA-256 hash is
//! stored, together with the experiment/variant/user it was minted for.

use rand::Rng;

use crate::auth::AuthDenial;
use crate::signature::sha256_hex;
use crate::store::EditorTokenRecord;
use crate::types::Timestamp;

/// Length of the plaintext token (alphanumeric characters).
pub const TOKEN_LENGTH: usize = 32;

/// Token lifetime, matching the signature window.
pub const TOKEN_TTL_MINS: i64 = 60;

/// A freshly minted token. The plaintext must never be persisted.
#[derive(Debug, Clone)]
pub struct GeneratedEditorToken {
    pub plaintext: String,
    pub hash: String,
}

pub fn generate_editor_token() -> GeneratedEditorToken {
    let plaintext: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect();
    let hash = hash_editor_token(&plaintext);
    GeneratedEditorToken { plaintext, hash }
}

pub fn hash_editor_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

/// Build the record stored at mint time (`used = false`).
pub fn new_token_record(
    token: &GeneratedEditorToken,
    experiment_id: &str,
    variant_id: &str,
    user_id: &str,
    now: Timestamp,
) -> EditorTokenRecord {
    EditorTokenRecord {
        token_hash: token.hash.clone(),
        experiment_id: experiment_id.to_string(),
        variant_id: variant_id.to_string(),
        user_id: user_id.to_string(),
        expires_at: now + chrono::Duration::minutes(TOKEN_TTL_MINS),
        used: false,
        created_at: now,
    }
}

/// Outcome of a successful token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    First,
    Reused,
}

/// Check a stored token against the experiment/variant it is presented for.
pub fn check_token(
    record: Option<&EditorTokenRecord>,
    experiment_id: &str,
    variant_id: &str,
    now: Timestamp,
) -> Result<TokenUse, AuthDenial> {
    let record = record.ok_or(AuthDenial::SignatureMismatch)?;
    if record.experiment_id != experiment_id || record.variant_id != variant_id {
        return Err(AuthDenial::OwnershipMismatch);
    }
    if now > record.expires_at {
        return Err(AuthDenial::Expired);
    }
    Ok(if record.used {
        TokenUse::Reused
    } else {
        TokenUse::First
    })
}
