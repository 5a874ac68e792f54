//! Module run rows (`module_runs`).

use leadgraph_core::error::CoreError;
use leadgraph_core::runs::ModuleRun;
use leadgraph_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::status::{run_status_from_id, StatusId};

/// A row from the `module_runs` table.
#[derive(Debug, Clone, FromRow)]
pub struct ModuleRunRow {
    pub id: DbId,
    pub project_id: DbId,
    pub person_id: Option<DbId>,
    pub triggered_by_user_id: DbId,
    pub module_key: String,
    pub module_version: String,
    pub status_id: StatusId,
    pub input_config: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ModuleRunRow> for ModuleRun {
    type Error = CoreError;

    fn try_from(row: ModuleRunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            person_id: row.person_id,
            triggered_by_user_id: row.triggered_by_user_id,
            module_key: row.module_key,
            module_version: row.module_version,
            status: run_status_from_id(row.status_id)?,
            input_config: row.input_config,
            output: row.output,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
