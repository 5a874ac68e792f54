//! Repository for the `module_jobs` queue table.

use leadgraph_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{job_state, ModuleJobRow};

/// Column list for `module_jobs` queries.
const COLUMNS: &str = "\
    id, job_type, payload, state, claimed_by, attempts, last_error, \
    enqueued_at, claimed_at, finished_at";

/// Provides queue operations over `module_jobs`.
pub struct JobRepo;

impl JobRepo {
    pub async fn publish(
        pool: &PgPool,
        job_type: &str,
        payload: &serde_json::Value,
    ) -> Result<ModuleJobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO module_jobs (job_type, payload, state) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModuleJobRow>(&query)
            .bind(job_type)
            .bind(payload)
            .bind(job_state::PENDING)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest pending job.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same row.
    pub async fn claim_next(
        pool: &PgPool,
        worker_name: &str,
    ) -> Result<Option<ModuleJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE module_jobs \
             SET state = $2, claimed_by = $1, claimed_at = NOW(), attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM module_jobs \
                 WHERE state = $3 \
                 ORDER BY enqueued_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModuleJobRow>(&query)
            .bind(worker_name)
            .bind(job_state::CLAIMED)
            .bind(job_state::PENDING)
            .fetch_optional(pool)
            .await
    }

    /// Close an open job. Returns `false` if no open job has `job_id`.
    pub async fn finish(
        pool: &PgPool,
        job_id: DbId,
        state: &str,
        last_error: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE module_jobs \
             SET state = $2, last_error = COALESCE($3, last_error), finished_at = NOW() \
             WHERE id = $1 AND state IN ($4, $5)",
        )
        .bind(job_id)
        .bind(state)
        .bind(last_error)
        .bind(job_state::PENDING)
        .bind(job_state::CLAIMED)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether an open job of `job_type` carries `run_id`.
    ///
    /// Pending jobs always count. With `claimed_since` set, a claimed job
    /// counts only if it was claimed at or after that instant; older claims
    /// are treated as lost with their worker.
    pub async fn has_open_job_for_run(
        pool: &PgPool,
        job_type: &str,
        run_id: DbId,
        claimed_since: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS( \
                 SELECT 1 FROM module_jobs \
                 WHERE job_type = $1 \
                   AND (payload->>'run_id')::BIGINT = $2 \
                   AND (state = $3 \
                        OR (state = $4 AND ($5::TIMESTAMPTZ IS NULL OR claimed_at >= $5))) \
             )",
        )
        .bind(job_type)
        .bind(run_id)
        .bind(job_state::PENDING)
        .bind(job_state::CLAIMED)
        .bind(claimed_since)
        .fetch_one(pool)
        .await
    }
}
