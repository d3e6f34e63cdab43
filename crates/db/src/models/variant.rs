use navlens_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `variants` table.
///
/// `modifications` is kept as raw JSON; it is decoded and re-sanitized by the
/// caller on every read.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Variant {
    pub id: String,
    pub experiment_id: String,
    pub name: String,
    pub modifications: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Variant {
    /// Stored entries; anything other than a JSON array reads as empty.
    pub fn modification_entries(&self) -> Vec<serde_json::Value> {
        match &self.modifications {
            serde_json::Value::Array(entries) => entries.clone(),
            _ => Vec::new(),
        }
    }
}
