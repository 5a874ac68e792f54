//! Queue rows (`module_jobs`).

use leadgraph_core::dispatch::QueuedJob;
use leadgraph_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Job lifecycle states stored in `module_jobs.state`.
pub mod job_state {
    pub const PENDING: &str = "pending";
    pub const CLAIMED: &str = "claimed";
    pub const ACKNOWLEDGED: &str = "acknowledged";
    pub const REJECTED: &str = "rejected";
}

/// A row from the `module_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct ModuleJobRow {
    pub id: DbId,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub state: String,
    pub claimed_by: Option<String>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub enqueued_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl From<ModuleJobRow> for QueuedJob {
    fn from(row: ModuleJobRow) -> Self {
        Self {
            id: row.id,
            job_type: row.job_type,
            payload: row.payload,
            attempts: row.attempts,
            enqueued_at: row.enqueued_at,
        }
    }
}
