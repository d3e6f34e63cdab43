//! Repository for the `experiments` table.

use sqlx::PgPool;

use crate::models::experiment::Experiment;

const COLUMNS: &str = "id, site_id, name, status, created_at, updated_at";

pub struct ExperimentRepo;

impl ExperimentRepo {
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Experiment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM experiments WHERE id = $1");
        sqlx::query_as::<_, Experiment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
