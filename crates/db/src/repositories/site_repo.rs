//! Repository for the `sites` table.

use sqlx::PgPool;

pub struct SiteRepo;

impl SiteRepo {
    /// The owning user of a site.
    pub async fn owner_of(pool: &PgPool, id: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT owner_id FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
