//! HMAC request signatures for the embedded editor.
//!
//! The editor runs on the customer's origin where no dashboard session cookie
//! is available, so each load/save call carries
//! `HMAC-SHA256(secret, "{experimentId}:{variantId}:{timestamp}")`, truncated
//! to [`SIGNATURE_HEX_LEN`] hex characters, valid for [`SIGNATURE_WINDOW_MS`].

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::EpochMillis;

/// Hex characters kept from the full HMAC digest.
pub const SIGNATURE_HEX_LEN: usize = 16;

/// Signature lifetime: one hour in milliseconds.
pub const SIGNATURE_WINDOW_MS: i64 = 3_600_000;

type HmacSha256 = Hmac<Sha256>;

/// The message that is signed.
pub fn signing_payload(experiment_id: &str, variant_id: &str, timestamp: EpochMillis) -> String {
    format!("{experiment_id}:{variant_id}:{timestamp}")
}

/// Compute the truncated signature for an experiment/variant pair.
pub fn sign(secret: &str, experiment_id: &str, variant_id: &str, timestamp: EpochMillis) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signing_payload(experiment_id, variant_id, timestamp).as_bytes());
    let mut digest = hex::encode(mac.finalize().into_bytes());
    digest.truncate(SIGNATURE_HEX_LEN);
    digest
}

/// Constant-time check of a provided signature.
pub fn verify_signature(
    secret: &str,
    experiment_id: &str,
    variant_id: &str,
    timestamp: EpochMillis,
    provided: &str,
) -> bool {
    let expected = sign(secret, experiment_id, variant_id, timestamp);
    constant_time_eq(&expected, &provided.to_ascii_lowercase())
}

/// `true` iff `0 <= now - timestamp <= SIGNATURE_WINDOW_MS`.
pub fn within_window(timestamp: EpochMillis, now: EpochMillis) -> bool {
    now.checked_sub(timestamp)
        .is_some_and(|age| (0..=SIGNATURE_WINDOW_MS).contains(&age))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// SHA-256 hex digest, used to store one-time tokens.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
