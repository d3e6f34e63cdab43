//! Repository for the `editor_tokens` table.

use navlens_core::store::EditorTokenRecord;
use sqlx::PgPool;

use crate::models::editor_token::EditorToken;

const COLUMNS: &str =
    "token_hash, experiment_id, variant_id, user_id, expires_at, used, created_at";

pub struct EditorTokenRepo;

impl EditorTokenRepo {
    pub async fn create(pool: &PgPool, token: &EditorTokenRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO editor_tokens \
                (token_hash, experiment_id, variant_id, user_id, expires_at, used, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&token.token_hash)
        .bind(&token.experiment_id)
        .bind(&token.variant_id)
        .bind(&token.user_id)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<EditorToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM editor_tokens WHERE token_hash = $1");
        sqlx::query_as::<_, EditorToken>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Flip `used` to true. Returns `true` only for the call that flipped it.
    pub async fn mark_used(pool: &PgPool, token_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE editor_tokens SET used = true WHERE token_hash = $1 AND used = false",
        )
        .bind(token_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete tokens that expired before now. Returns the number removed.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM editor_tokens WHERE expires_at < now()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
