use navlens_core::store::ExperimentRecord;
use navlens_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `experiments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Experiment {
    pub id: String,
    pub site_id: String,
    pub name: String,
    /// `draft`, `running`, `paused` or `completed`.
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Experiment> for ExperimentRecord {
    fn from(row: Experiment) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            status: row.status,
        }
    }
}
