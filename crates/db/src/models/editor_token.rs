use navlens_core::store::EditorTokenRecord;
use navlens_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `editor_tokens` table. Never serialized to responses.
#[derive(Debug, Clone, FromRow)]
pub struct EditorToken {
    pub token_hash: String,
    pub experiment_id: String,
    pub variant_id: String,
    pub user_id: String,
    pub expires_at: Timestamp,
    pub used: bool,
    pub created_at: Timestamp,
}

impl From<EditorToken> for EditorTokenRecord {
    fn from(row: EditorToken) -> Self {
        Self {
            token_hash: row.token_hash,
            experiment_id: row.experiment_id,
            variant_id: row.variant_id,
            user_id: row.user_id,
            expires_at: row.expires_at,
            used: row.used,
            created_at: row.created_at,
        }
    }
}
