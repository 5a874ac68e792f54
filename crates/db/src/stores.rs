//! PostgreSQL implementations of the core storage and queue ports.

use std::sync::Arc;

use async_trait::async_trait;
use leadgraph_core::dispatch::{JobQueue, NewJob, QueueError, QueuedJob, EXECUTE_MODULE_RUN};
use leadgraph_core::engine::Backends;
use leadgraph_core::error::CoreError;
use leadgraph_core::ledger::RunStore;
use leadgraph_core::modules::{ModuleDefinition, ModuleFilter, ModuleUpdate, NewModuleDefinition};
use leadgraph_core::registry::ModuleStore;
use leadgraph_core::runs::{ModuleRun, NewModuleRun, RunQuery, RunStatus, StatusReport};
use leadgraph_core::scope::EntityDirectory;
use leadgraph_core::types::{DbId, Timestamp};

use crate::models::job::job_state;
use crate::repositories::module_definition_repo::KEY_VERSION_CONSTRAINT;
use crate::repositories::{DirectoryRepo, JobRepo, ModuleDefinitionRepo, ModuleRunRepo};
use crate::DbPool;

/// PostgreSQL `unique_violation` error code.
const UNIQUE_VIOLATION: &str = "23505";

/// All four ports over one pool.
pub fn pg_backends(pool: DbPool) -> Backends {
    Backends {
        modules: Arc::new(PgModuleStore::new(pool.clone())),
        runs: Arc::new(PgRunStore::new(pool.clone())),
        directory: Arc::new(PgEntityDirectory::new(pool.clone())),
        queue: Arc::new(PgJobQueue::new(pool)),
    }
}

fn internal(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(format!("Database error: {err}"))
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

fn to_definitions<I>(rows: I) -> Result<Vec<ModuleDefinition>, CoreError>
where
    I: IntoIterator<Item = crate::models::module_definition::ModuleDefinitionRow>,
{
    rows.into_iter().map(ModuleDefinition::try_from).collect()
}

fn to_runs<I>(rows: I) -> Result<Vec<ModuleRun>, CoreError>
where
    I: IntoIterator<Item = crate::models::module_run::ModuleRunRow>,
{
    rows.into_iter().map(ModuleRun::try_from).collect()
}

// ---------------------------------------------------------------------------
// Module registry
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgModuleStore {
    pool: DbPool,
}

impl PgModuleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModuleStore for PgModuleStore {
    async fn insert(&self, input: &NewModuleDefinition) -> Result<ModuleDefinition, CoreError> {
        match ModuleDefinitionRepo::create(&self.pool, input).await {
            Ok(row) => ModuleDefinition::try_from(row),
            Err(e) if is_unique_violation(&e, KEY_VERSION_CONSTRAINT) => {
                Err(CoreError::DuplicateDefinition {
                    module_key: input.module_key.clone(),
                    version: input.version.clone(),
                })
            }
            Err(e) => Err(internal(e)),
        }
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<ModuleDefinition>, CoreError> {
        ModuleDefinitionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(internal)?
            .map(ModuleDefinition::try_from)
            .transpose()
    }

    async fn find_by_key_version(
        &self,
        module_key: &str,
        version: &str,
    ) -> Result<Option<ModuleDefinition>, CoreError> {
        ModuleDefinitionRepo::find_by_key_version(&self.pool, module_key, version)
            .await
            .map_err(internal)?
            .map(ModuleDefinition::try_from)
            .transpose()
    }

    async fn list(&self, filter: &ModuleFilter) -> Result<Vec<ModuleDefinition>, CoreError> {
        let rows = ModuleDefinitionRepo::list(&self.pool, filter)
            .await
            .map_err(internal)?;
        to_definitions(rows)
    }

    async fn list_enabled_by_key(
        &self,
        module_key: &str,
    ) -> Result<Vec<ModuleDefinition>, CoreError> {
        let rows = ModuleDefinitionRepo::list_enabled_by_key(&self.pool, module_key)
            .await
            .map_err(internal)?;
        to_definitions(rows)
    }

    async fn update(
        &self,
        id: DbId,
        update: &ModuleUpdate,
    ) -> Result<Option<ModuleDefinition>, CoreError> {
        ModuleDefinitionRepo::update(&self.pool, id, update)
            .await
            .map_err(internal)?
            .map(ModuleDefinition::try_from)
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Run ledger
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgRunStore {
    pool: DbPool,
}

impl PgRunStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn insert(&self, run: &NewModuleRun) -> Result<ModuleRun, CoreError> {
        let row = ModuleRunRepo::create(&self.pool, run)
            .await
            .map_err(internal)?;
        ModuleRun::try_from(row)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<ModuleRun>, CoreError> {
        ModuleRunRepo::find_by_id(&self.pool, id)
            .await
            .map_err(internal)?
            .map(ModuleRun::try_from)
            .transpose()
    }

    async fn list(&self, query: &RunQuery) -> Result<Vec<ModuleRun>, CoreError> {
        let rows = ModuleRunRepo::list(&self.pool, query)
            .await
            .map_err(internal)?;
        to_runs(rows)
    }

    async fn transition(
        &self,
        id: DbId,
        from: RunStatus,
        to: RunStatus,
        report: &StatusReport,
    ) -> Result<Option<ModuleRun>, CoreError> {
        ModuleRunRepo::transition(&self.pool, id, from, to, report)
            .await
            .map_err(internal)?
            .map(ModuleRun::try_from)
            .transpose()
    }

    async fn list_queued_before(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<ModuleRun>, CoreError> {
        let rows = ModuleRunRepo::list_queued_before(&self.pool, cutoff, limit)
            .await
            .map_err(internal)?;
        to_runs(rows)
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(internal)
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgEntityDirectory {
    pool: DbPool,
}

impl PgEntityDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityDirectory for PgEntityDirectory {
    async fn project_exists(&self, project_id: DbId) -> Result<bool, CoreError> {
        DirectoryRepo::project_exists(&self.pool, project_id)
            .await
            .map_err(internal)
    }

    async fn person_in_project(
        &self,
        project_id: DbId,
        person_id: DbId,
    ) -> Result<bool, CoreError> {
        DirectoryRepo::person_in_project(&self.pool, project_id, person_id)
            .await
            .map_err(internal)
    }

    async fn user_exists(&self, user_id: DbId) -> Result<bool, CoreError> {
        DirectoryRepo::user_exists(&self.pool, user_id)
            .await
            .map_err(internal)
    }
}

// ---------------------------------------------------------------------------
// Job queue
// ---------------------------------------------------------------------------

fn unavailable(err: sqlx::Error) -> QueueError {
    tracing::warn!(error = %err, "Job queue database error");
    QueueError::Unavailable(err.to_string())
}

#[derive(Clone)]
pub struct PgJobQueue {
    pool: DbPool,
}

impl PgJobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn publish(&self, job: &NewJob) -> Result<QueuedJob, QueueError> {
        JobRepo::publish(&self.pool, &job.job_type, &job.payload)
            .await
            .map(QueuedJob::from)
            .map_err(unavailable)
    }

    async fn claim_next(&self, worker_name: &str) -> Result<Option<QueuedJob>, QueueError> {
        JobRepo::claim_next(&self.pool, worker_name)
            .await
            .map(|row| row.map(QueuedJob::from))
            .map_err(unavailable)
    }

    async fn acknowledge(&self, job_id: DbId) -> Result<(), QueueError> {
        let finished = JobRepo::finish(&self.pool, job_id, job_state::ACKNOWLEDGED, None)
            .await
            .map_err(unavailable)?;
        if finished {
            Ok(())
        } else {
            Err(QueueError::UnknownJob(job_id))
        }
    }

    async fn reject(&self, job_id: DbId, reason: &str) -> Result<(), QueueError> {
        let finished = JobRepo::finish(&self.pool, job_id, job_state::REJECTED, Some(reason))
            .await
            .map_err(unavailable)?;
        if finished {
            Ok(())
        } else {
            Err(QueueError::UnknownJob(job_id))
        }
    }

    async fn has_open_job_for_run(
        &self,
        run_id: DbId,
        claimed_since: Option<Timestamp>,
    ) -> Result<bool, QueueError> {
        JobRepo::has_open_job_for_run(&self.pool, EXECUTE_MODULE_RUN, run_id, claimed_since)
            .await
            .map_err(unavailable)
    }
}
