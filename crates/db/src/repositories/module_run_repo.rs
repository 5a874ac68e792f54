//! Repository for the `module_runs` table.
//!
//! Status changes are compare-and-set on `status_id`; the caller decides
//! which transitions are legal.

use leadgraph_core::runs::{NewModuleRun, RunQuery, RunStatus, StatusReport};
use leadgraph_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::module_run::ModuleRunRow;
use crate::models::status::{run_status_id, ModuleRunStatus};

/// Column list for `module_runs` queries.
const COLUMNS: &str = "\
    id, project_id, person_id, triggered_by_user_id, module_key, module_version, \
    status_id, input_config, output, error_message, \
    started_at, completed_at, created_at, updated_at";

/// Provides persistence for module runs.
pub struct ModuleRunRepo;

impl ModuleRunRepo {
    /// Insert a new run in QUEUED.
    pub async fn create(pool: &PgPool, input: &NewModuleRun) -> Result<ModuleRunRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO module_runs \
                (project_id, person_id, triggered_by_user_id, module_key, module_version, \
                 status_id, input_config) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModuleRunRow>(&query)
            .bind(input.project_id)
            .bind(input.person_id)
            .bind(input.triggered_by_user_id)
            .bind(&input.module_key)
            .bind(&input.module_version)
            .bind(ModuleRunStatus::Queued.id())
            .bind(&input.input_config)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ModuleRunRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM module_runs WHERE id = $1");
        sqlx::query_as::<_, ModuleRunRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Runs for a project (and optionally a person), newest first.
    pub async fn list(pool: &PgPool, params: &RunQuery) -> Result<Vec<ModuleRunRow>, sqlx::Error> {
        let mut conditions: Vec<String> = vec!["project_id = $1".to_string()];
        let mut bind_idx: u32 = 2;

        if params.person_id.is_some() {
            conditions.push(format!("person_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.module_key.is_some() {
            conditions.push(format!("module_key = ${bind_idx}"));
            bind_idx += 1;
        }

        let query = format!(
            "SELECT {COLUMNS} FROM module_runs \
             WHERE {} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx}",
            conditions.join(" AND ")
        );

        let mut q = sqlx::query_as::<_, ModuleRunRow>(&query).bind(params.project_id);
        if let Some(person_id) = params.person_id {
            q = q.bind(person_id);
        }
        if let Some(status) = params.status {
            q = q.bind(run_status_id(status));
        }
        if let Some(ref key) = params.module_key {
            q = q.bind(key);
        }
        q.bind(params.limit).fetch_all(pool).await
    }

    /// Move a run from `from` to `to` if it is still in `from`.
    ///
    /// Entering RUNNING stamps `started_at`; entering a terminal status stamps
    /// `completed_at` and records the report. Returns `None` when no row
    /// matched.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: RunStatus,
        to: RunStatus,
        report: &StatusReport,
    ) -> Result<Option<ModuleRunRow>, sqlx::Error> {
        let query = format!(
            "UPDATE module_runs SET \
                status_id = $3, \
                started_at = CASE WHEN $4 THEN NOW() ELSE started_at END, \
                completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END, \
                error_message = COALESCE($6, error_message), \
                output = COALESCE($7, output) \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModuleRunRow>(&query)
            .bind(id)
            .bind(run_status_id(from))
            .bind(run_status_id(to))
            .bind(to == RunStatus::Running)
            .bind(to.is_terminal())
            .bind(&report.error_message)
            .bind(&report.output)
            .fetch_optional(pool)
            .await
    }

    /// QUEUED runs created before `cutoff`, oldest first.
    pub async fn list_queued_before(
        pool: &PgPool,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<ModuleRunRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM module_runs \
             WHERE status_id = $1 AND created_at < $2 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, ModuleRunRow>(&query)
            .bind(ModuleRunStatus::Queued.id())
            .bind(cutoff)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
