//! Collaborator interfaces consumed by the engine: ownership lookups,
//! modification persistence, one-time editor tokens and config publishing.
//!
//! `navlens-db` provides the PostgreSQL implementation; tests use in-memory
//! ones.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::modification::Modification;
use crate::types::Timestamp;

/// Experiment status that triggers a config publish after a save.
pub const STATUS_RUNNING: &str = "running";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentRecord {
    pub id: String,
    pub site_id: String,
    pub status: String,
}

impl ExperimentRecord {
    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }
}

/// Who owns what. Every lookup returns `None` for unknown ids.
#[async_trait]
pub trait OwnershipDirectory: Send + Sync {
    async fn site_owner(&self, site_id: &str) -> Result<Option<String>, CoreError>;

    async fn experiment(&self, experiment_id: &str) -> Result<Option<ExperimentRecord>, CoreError>;

    /// The experiment a variant belongs to.
    async fn variant_experiment(&self, variant_id: &str) -> Result<Option<String>, CoreError>;
}

/// Persistence for a variant's modification array. Saves replace the whole
/// array (last write wins).
#[async_trait]
pub trait VariantStore: OwnershipDirectory {
    /// Stored entries as raw JSON so callers can re-sanitize on read.
    async fn load_modifications(&self, variant_id: &str)
        -> Result<Vec<serde_json::Value>, CoreError>;

    async fn save_modifications(
        &self,
        variant_id: &str,
        modifications: &[Modification],
    ) -> Result<(), CoreError>;

    /// Whether the backing store is reachable.
    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// A stored one-time editor token. Only the SHA-256 hash is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorTokenRecord {
    pub token_hash: String,
    pub experiment_id: String,
    pub variant_id: String,
    pub user_id: String,
    pub expires_at: Timestamp,
    pub used: bool,
    pub created_at: Timestamp,
}

#[async_trait]
pub trait EditorTokenStore: Send + Sync {
    async fn insert_token(&self, token: &EditorTokenRecord) -> Result<(), CoreError>;

    async fn find_token(&self, token_hash: &str) -> Result<Option<EditorTokenRecord>, CoreError>;

    /// Set `used = true`. Returns `true` if the token was previously unused.
    async fn mark_token_used(&self, token_hash: &str) -> Result<bool, CoreError>;
}

/// Everything the editor endpoints need from persistence.
pub trait EditorStore: VariantStore + EditorTokenStore {}

impl<T: VariantStore + EditorTokenStore> EditorStore for T {}

/// Publishes an experiment's config after its modifications change.
#[async_trait]
pub trait ConfigPublisher: Send + Sync {
    async fn publish(&self, experiment_id: &str, site_id: &str) -> Result<(), CoreError>;
}
