//! Dispatch gateway: the only write path into the job queue.
//!
//! A job carries nothing but the run id. Workers re-read the run from the
//! ledger, so an enqueue-time snapshot can never go stale. Enqueue happens
//! strictly after the run row is committed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Job type for executing a module run.
pub const EXECUTE_MODULE_RUN: &str = "EXECUTE_MODULE_RUN";

/// Payload of an [`EXECUTE_MODULE_RUN`] job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteModuleRun {
    pub run_id: DbId,
}

/// A job to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub job_type: String,
    pub payload: serde_json::Value,
}

impl NewJob {
    pub fn execute_module_run(run_id: DbId) -> Self {
        Self {
            job_type: EXECUTE_MODULE_RUN.to_string(),
            payload: serde_json::json!({ "run_id": run_id }),
        }
    }
}

/// A job as stored in the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedJob {
    pub id: DbId,
    pub job_type: String,
    pub payload: serde_json::Value,
    /// How many times this job has been claimed.
    pub attempts: i32,
    pub enqueued_at: Timestamp,
}

impl QueuedJob {
    /// Decode the run id from an [`EXECUTE_MODULE_RUN`] job.
    pub fn run_id(&self) -> Result<DbId, QueueError> {
        if self.job_type != EXECUTE_MODULE_RUN {
            return Err(QueueError::Malformed {
                job_id: self.id,
                reason: format!("unexpected job type '{}'", self.job_type),
            });
        }
        serde_json::from_value::<ExecuteModuleRun>(self.payload.clone())
            .map(|p| p.run_id)
            .map_err(|e| QueueError::Malformed {
                job_id: self.id,
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job queue unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed job {job_id}: {reason}")]
    Malformed { job_id: DbId, reason: String },

    #[error("Job {0} not found")]
    UnknownJob(DbId),
}

/// Durable job queue port.
///
/// A job is *open* from publish until it is acknowledged or rejected. A claim
/// carries no heartbeat, so callers looking for lost work pass a cutoff after
/// which a claim no longer counts.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, job: &NewJob) -> Result<QueuedJob, QueueError>;

    /// Claim the oldest unclaimed job, if any. Concurrent claimers never
    /// receive the same job.
    async fn claim_next(&self, worker_name: &str) -> Result<Option<QueuedJob>, QueueError>;

    /// Mark a claimed job as done.
    async fn acknowledge(&self, job_id: DbId) -> Result<(), QueueError>;

    /// Mark a claimed job as unprocessable.
    async fn reject(&self, job_id: DbId, reason: &str) -> Result<(), QueueError>;

    /// Whether an open job carries `run_id`. A claimed job counts only if it
    /// was claimed at or after `claimed_since`; `None` counts every claim.
    async fn has_open_job_for_run(
        &self,
        run_id: DbId,
        claimed_since: Option<Timestamp>,
    ) -> Result<bool, QueueError>;
}

#[derive(Clone)]
pub struct DispatchGateway {
    queue: Arc<dyn JobQueue>,
}

impl DispatchGateway {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Publish an [`EXECUTE_MODULE_RUN`] job for a committed run.
    ///
    /// Queue failures surface as [`CoreError::DispatchFailure`] so callers can
    /// tell "run exists but has no job" apart from validation failures.
    pub async fn enqueue(&self, run_id: DbId) -> Result<DbId, CoreError> {
        match self.queue.publish(&NewJob::execute_module_run(run_id)).await {
            Ok(job) => {
                tracing::info!(run_id, job_id = job.id, "Module run dispatched");
                Ok(job.id)
            }
            Err(e) => {
                tracing::error!(run_id, error = %e, "Failed to enqueue module run");
                Err(CoreError::DispatchFailure {
                    run_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    pub async fn has_open_job(&self, run_id: DbId) -> Result<bool, CoreError> {
        self.open_job(run_id, None).await
    }

    /// Like [`has_open_job`](Self::has_open_job), but a claim taken before
    /// `claimed_since` is treated as abandoned.
    pub async fn has_live_job(
        &self,
        run_id: DbId,
        claimed_since: Timestamp,
    ) -> Result<bool, CoreError> {
        self.open_job(run_id, Some(claimed_since)).await
    }

    async fn open_job(
        &self,
        run_id: DbId,
        claimed_since: Option<Timestamp>,
    ) -> Result<bool, CoreError> {
        self.queue
            .has_open_job_for_run(run_id, claimed_since)
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::MemoryJobQueue;

    #[test]
    fn payload_is_only_the_run_id() {
        let job = NewJob::execute_module_run(17);
        assert_eq!(job.job_type, EXECUTE_MODULE_RUN);
        assert_eq!(job.payload, serde_json::json!({ "run_id": 17 }));
    }

    #[test]
    fn run_id_decodes() {
        let job = QueuedJob {
            id: 1,
            job_type: EXECUTE_MODULE_RUN.into(),
            payload: serde_json::json!({ "run_id": 5 }),
            attempts: 0,
            enqueued_at: chrono::Utc::now(),
        };
        assert_eq!(job.run_id().unwrap(), 5);
    }

    #[test]
    fn wrong_job_type_is_malformed() {
        let job = QueuedJob {
            id: 3,
            job_type: "SEND_EMAIL".into(),
            payload: serde_json::json!({ "run_id": 5 }),
            attempts: 0,
            enqueued_at: chrono::Utc::now(),
        };
        assert_matches!(job.run_id(), Err(QueueError::Malformed { job_id: 3, .. }));
    }

    #[test]
    fn extra_payload_fields_are_malformed() {
        let job = QueuedJob {
            id: 4,
            job_type: EXECUTE_MODULE_RUN.into(),
            payload: serde_json::json!({ "run_id": 5, "input": {} }),
            attempts: 0,
            enqueued_at: chrono::Utc::now(),
        };
        assert!(job.run_id().is_err());
    }

    #[tokio::test]
    async fn enqueue_publishes_job() {
        let queue = Arc::new(MemoryJobQueue::default());
        let gateway = DispatchGateway::new(queue.clone());
        gateway.enqueue(9).await.unwrap();
        assert!(gateway.has_open_job(9).await.unwrap());
        assert!(!gateway.has_open_job(10).await.unwrap());
    }

    #[tokio::test]
    async fn stale_claim_is_not_live() {
        let queue = Arc::new(MemoryJobQueue::default());
        let gateway = DispatchGateway::new(queue.clone());
        gateway.enqueue(11).await.unwrap();
        queue.claim_next("gone-worker").await.unwrap().unwrap();

        let later = chrono::Utc::now() + chrono::Duration::minutes(10);
        assert!(gateway.has_open_job(11).await.unwrap());
        assert!(!gateway.has_live_job(11, later).await.unwrap());
    }

    #[tokio::test]
    async fn unavailable_queue_is_dispatch_failure() {
        let queue = Arc::new(MemoryJobQueue::default());
        queue.set_available(false).await;
        let gateway = DispatchGateway::new(queue);
        let err = gateway.enqueue(9).await.unwrap_err();
        assert_matches!(err, CoreError::DispatchFailure { run_id: 9, .. });
    }
}
