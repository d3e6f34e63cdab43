//! Repository for the `variants` table.

use sqlx::PgPool;

use crate::models::variant::Variant;

const COLUMNS: &str = "id, experiment_id, name, modifications, created_at, updated_at";

pub struct VariantRepo;

impl VariantRepo {
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Variant>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM variants WHERE id = $1");
        sqlx::query_as::<_, Variant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn experiment_of(pool: &PgPool, id: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT experiment_id FROM variants WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Replace the whole modification array. Last write wins.
    ///
    /// Returns `false` if no variant with `id` exists.
    pub async fn replace_modifications(
        pool: &PgPool,
        id: &str,
        modifications: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE variants SET modifications = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(modifications)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
