//! In-memory implementations of every storage and queue port.
//!
//! Used by tests and by local runs without a database. Each store keeps its
//! rows behind a tokio lock; ids are assigned sequentially from 1.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::dispatch::{JobQueue, NewJob, QueueError, QueuedJob};
use crate::engine::Backends;
use crate::error::CoreError;
use crate::ledger::RunStore;
use crate::modules::{ModuleDefinition, ModuleFilter, ModuleUpdate, NewModuleDefinition};
use crate::registry::ModuleStore;
use crate::runs::{ModuleRun, NewModuleRun, RunQuery, RunStatus, StatusReport};
use crate::scope::EntityDirectory;
use crate::types::{DbId, Timestamp};

impl Backends {
    /// Backends with an empty directory: no project, person, or user exists.
    pub fn in_memory() -> Self {
        Self::in_memory_with_directory(MemoryDirectory::default())
    }

    pub fn in_memory_with_directory(directory: MemoryDirectory) -> Self {
        Self {
            modules: Arc::new(MemoryModuleStore::default()),
            runs: Arc::new(MemoryRunStore::default()),
            directory: Arc::new(directory),
            queue: Arc::new(MemoryJobQueue::default()),
        }
    }
}

// ---------------------------------------------------------------------------
// Module definitions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryModuleStore {
    rows: RwLock<Vec<ModuleDefinition>>,
}

#[async_trait]
impl ModuleStore for MemoryModuleStore {
    async fn insert(&self, input: &NewModuleDefinition) -> Result<ModuleDefinition, CoreError> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|d| d.module_key == input.module_key && d.version == input.version)
        {
            return Err(CoreError::DuplicateDefinition {
                module_key: input.module_key.clone(),
                version: input.version.clone(),
            });
        }

        let now = Utc::now();
        let row = ModuleDefinition {
            id: rows.len() as DbId + 1,
            module_key: input.module_key.clone(),
            module_type: input.module_type,
            scope: input.scope,
            version: input.version.clone(),
            config_schema: input.config_schema.clone(),
            is_enabled: input.is_enabled,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<ModuleDefinition>, CoreError> {
        Ok(self.rows.read().await.iter().find(|d| d.id == id).cloned())
    }

    async fn find_by_key_version(
        &self,
        module_key: &str,
        version: &str,
    ) -> Result<Option<ModuleDefinition>, CoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|d| d.module_key == module_key && d.version == version)
            .cloned())
    }

    async fn list(&self, filter: &ModuleFilter) -> Result<Vec<ModuleDefinition>, CoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    async fn list_enabled_by_key(
        &self,
        module_key: &str,
    ) -> Result<Vec<ModuleDefinition>, CoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|d| d.is_enabled && d.module_key == module_key)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: DbId,
        update: &ModuleUpdate,
    ) -> Result<Option<ModuleDefinition>, CoreError> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if let Some(enabled) = update.is_enabled {
            row.is_enabled = enabled;
        }
        if let Some(schema) = &update.config_schema {
            row.config_schema = schema.clone();
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

// ---------------------------------------------------------------------------
// Module runs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRunStore {
    rows: RwLock<Vec<ModuleRun>>,
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn insert(&self, run: &NewModuleRun) -> Result<ModuleRun, CoreError> {
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        let row = ModuleRun {
            id: rows.len() as DbId + 1,
            project_id: run.project_id,
            person_id: run.person_id,
            triggered_by_user_id: run.triggered_by_user_id,
            module_key: run.module_key.clone(),
            module_version: run.module_version.clone(),
            status: RunStatus::Queued,
            input_config: run.input_config.clone(),
            output: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<ModuleRun>, CoreError> {
        Ok(self.rows.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, query: &RunQuery) -> Result<Vec<ModuleRun>, CoreError> {
        let mut matching: Vec<ModuleRun> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        matching.truncate(query.limit.max(0) as usize);
        Ok(matching)
    }

    async fn transition(
        &self,
        id: DbId,
        from: RunStatus,
        to: RunStatus,
        report: &StatusReport,
    ) -> Result<Option<ModuleRun>, CoreError> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|r| r.id == id && r.status == from) else {
            return Ok(None);
        };

        let now = Utc::now();
        row.status = to;
        row.updated_at = now;
        match to {
            RunStatus::Running => row.started_at = Some(now),
            RunStatus::Completed | RunStatus::Failed => {
                row.completed_at = Some(now);
                row.error_message = report.error_message.clone();
                row.output = report.output.clone();
            }
            RunStatus::Queued => {}
        }
        Ok(Some(row.clone()))
    }

    async fn list_queued_before(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<ModuleRun>, CoreError> {
        let mut stale: Vec<ModuleRun> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.status == RunStatus::Queued && r.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        stale.truncate(limit.max(0) as usize);
        Ok(stale)
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entity directory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDirectory {
    projects: RwLock<HashSet<DbId>>,
    persons: RwLock<HashSet<(DbId, DbId)>>,
    users: RwLock<HashSet<DbId>>,
}

impl MemoryDirectory {
    pub async fn add_project(&self, project_id: DbId) {
        self.projects.write().await.insert(project_id);
    }

    /// Register a person as a member of `project_id`.
    pub async fn add_person(&self, project_id: DbId, person_id: DbId) {
        self.persons.write().await.insert((project_id, person_id));
    }

    pub async fn add_user(&self, user_id: DbId) {
        self.users.write().await.insert(user_id);
    }
}

#[async_trait]
impl EntityDirectory for MemoryDirectory {
    async fn project_exists(&self, project_id: DbId) -> Result<bool, CoreError> {
        Ok(self.projects.read().await.contains(&project_id))
    }

    async fn person_in_project(
        &self,
        project_id: DbId,
        person_id: DbId,
    ) -> Result<bool, CoreError> {
        Ok(self.persons.read().await.contains(&(project_id, person_id)))
    }

    async fn user_exists(&self, user_id: DbId) -> Result<bool, CoreError> {
        Ok(self.users.read().await.contains(&user_id))
    }
}

// ---------------------------------------------------------------------------
// Job queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum JobState {
    Pending,
    Claimed,
    Acknowledged,
    Rejected(String),
}

struct MemoryJob {
    job: QueuedJob,
    state: JobState,
    claimed_at: Option<Timestamp>,
}

struct QueueState {
    jobs: Vec<MemoryJob>,
    available: bool,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            available: true,
        }
    }
}

/// FIFO queue in process memory. Can be switched offline to simulate an
/// unreachable broker.
#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
}

impl MemoryJobQueue {
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }

    /// Jobs neither acknowledged nor rejected.
    pub async fn open_job_count(&self) -> usize {
        self.state
            .lock()
            .await
            .jobs
            .iter()
            .filter(|j| matches!(j.state, JobState::Pending | JobState::Claimed))
            .count()
    }

    pub async fn rejection_reason(&self, job_id: DbId) -> Option<String> {
        self.state
            .lock()
            .await
            .jobs
            .iter()
            .find(|j| j.job.id == job_id)
            .and_then(|j| match &j.state {
                JobState::Rejected(reason) => Some(reason.clone()),
                _ => None,
            })
    }

    fn ensure_available(state: &QueueState) -> Result<(), QueueError> {
        if state.available {
            Ok(())
        } else {
            Err(QueueError::Unavailable("in-memory queue is offline".into()))
        }
    }

    async fn finish(&self, job_id: DbId, next: JobState) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| {
                j.job.id == job_id && matches!(j.state, JobState::Pending | JobState::Claimed)
            })
            .ok_or(QueueError::UnknownJob(job_id))?;
        job.state = next;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn publish(&self, job: &NewJob) -> Result<QueuedJob, QueueError> {
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;

        let queued = QueuedJob {
            id: state.jobs.len() as DbId + 1,
            job_type: job.job_type.clone(),
            payload: job.payload.clone(),
            attempts: 0,
            enqueued_at: Utc::now(),
        };
        state.jobs.push(MemoryJob {
            job: queued.clone(),
            state: JobState::Pending,
            claimed_at: None,
        });
        Ok(queued)
    }

    async fn claim_next(&self, _worker_name: &str) -> Result<Option<QueuedJob>, QueueError> {
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;

        let Some(next) = state.jobs.iter_mut().find(|j| j.state == JobState::Pending) else {
            return Ok(None);
        };
        next.state = JobState::Claimed;
        next.claimed_at = Some(Utc::now());
        next.job.attempts += 1;
        Ok(Some(next.job.clone()))
    }

    async fn acknowledge(&self, job_id: DbId) -> Result<(), QueueError> {
        self.finish(job_id, JobState::Acknowledged).await
    }

    async fn reject(&self, job_id: DbId, reason: &str) -> Result<(), QueueError> {
        self.finish(job_id, JobState::Rejected(reason.to_string())).await
    }

    async fn has_open_job_for_run(
        &self,
        run_id: DbId,
        claimed_since: Option<Timestamp>,
    ) -> Result<bool, QueueError> {
        let state = self.state.lock().await;
        Self::ensure_available(&state)?;
        Ok(state.jobs.iter().any(|j| {
            let open = match j.state {
                JobState::Pending => true,
                JobState::Claimed => match (claimed_since, j.claimed_at) {
                    (Some(cutoff), Some(at)) => at >= cutoff,
                    _ => true,
                },
                _ => false,
            };
            open && j.job.run_id().ok() == Some(run_id)
        }))
    }
}
