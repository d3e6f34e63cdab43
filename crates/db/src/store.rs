//! PostgreSQL implementation of the core collaborator traits.

use async_trait::async_trait;
use navlens_core::error::CoreError;
use navlens_core::modification::Modification;
use navlens_core::store::{
    EditorTokenRecord, EditorTokenStore, ExperimentRecord, OwnershipDirectory, VariantStore,
};

use crate::repositories::{EditorTokenRepo, ExperimentRepo, SiteRepo, VariantRepo};
use crate::DbPool;

/// [`VariantStore`] and [`EditorTokenStore`] over a connection pool.
#[derive(Debug, Clone)]
pub struct PgVariantStore {
    pool: DbPool,
}

impl PgVariantStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn persistence(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Database error");
    CoreError::Persistence(err.to_string())
}

#[async_trait]
impl OwnershipDirectory for PgVariantStore {
    async fn site_owner(&self, site_id: &str) -> Result<Option<String>, CoreError> {
        SiteRepo::owner_of(&self.pool, site_id)
            .await
            .map_err(persistence)
    }

    async fn experiment(&self, experiment_id: &str) -> Result<Option<ExperimentRecord>, CoreError> {
        let row = ExperimentRepo::find_by_id(&self.pool, experiment_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(ExperimentRecord::from))
    }

    async fn variant_experiment(&self, variant_id: &str) -> Result<Option<String>, CoreError> {
        VariantRepo::experiment_of(&self.pool, variant_id)
            .await
            .map_err(persistence)
    }
}

#[async_trait]
impl VariantStore for PgVariantStore {
    async fn load_modifications(
        &self,
        variant_id: &str,
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        let variant = VariantRepo::find_by_id(&self.pool, variant_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Variant",
                id: variant_id.to_string(),
            })?;
        Ok(variant.modification_entries())
    }

    async fn save_modifications(
        &self,
        variant_id: &str,
        modifications: &[Modification],
    ) -> Result<(), CoreError> {
        let json = serde_json::to_value(modifications)
            .map_err(|e| CoreError::Internal(format!("Failed to encode modifications: {e}")))?;
        let updated = VariantRepo::replace_modifications(&self.pool, variant_id, &json)
            .await
            .map_err(persistence)?;
        if !updated {
            return Err(CoreError::NotFound {
                entity: "Variant",
                id: variant_id.to_string(),
            });
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(persistence)
    }
}

#[async_trait]
impl EditorTokenStore for PgVariantStore {
    async fn insert_token(&self, token: &EditorTokenRecord) -> Result<(), CoreError> {
        EditorTokenRepo::create(&self.pool, token)
            .await
            .map_err(persistence)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<EditorTokenRecord>, CoreError> {
        let row = EditorTokenRepo::find_by_hash(&self.pool, token_hash)
            .await
            .map_err(persistence)?;
        Ok(row.map(EditorTokenRecord::from))
    }

    async fn mark_token_used(&self, token_hash: &str) -> Result<bool, CoreError> {
        EditorTokenRepo::mark_used(&self.pool, token_hash)
            .await
            .map_err(persistence)
    }
}
