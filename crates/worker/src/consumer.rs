//! Job consumer: claims `EXECUTE_MODULE_RUN` jobs and drives their runs.
//!
//! Polls the queue every `poll_interval` and drains it before sleeping
//! again. Runs are never retried automatically; a FAILED run stays failed.

use std::sync::Arc;
use std::time::Duration;

use leadgraph_core::dispatch::{JobQueue, QueueError, QueuedJob};
use leadgraph_core::error::CoreError;
use leadgraph_core::ledger::RunLedger;
use leadgraph_core::runs::{ModuleRun, RunStatus, StatusReport};
use leadgraph_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::executor::ExecutorRegistry;

/// Default polling interval for the consumer loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { run_id: DbId },
    Failed { run_id: DbId },
    /// The run had already left QUEUED; the job was a duplicate delivery.
    Skipped { run_id: DbId },
    /// The job could not be tied to a usable run.
    Rejected { job_id: DbId },
}

pub struct JobConsumer {
    queue: Arc<dyn JobQueue>,
    ledger: RunLedger,
    executors: ExecutorRegistry,
    worker_name: String,
    poll_interval: Duration,
}

impl JobConsumer {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        ledger: RunLedger,
        executors: ExecutorRegistry,
        worker_name: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            ledger,
            executors,
            worker_name: worker_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the consumer loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            worker = %self.worker_name,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Job consumer started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker = %self.worker_name, "Job consumer shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain(&cancel).await {
                        tracing::error!(error = %e, "Consume cycle failed");
                    }
                }
            }
        }
    }

    /// Process claimed jobs until the queue is empty or shutdown starts.
    async fn drain(&self, cancel: &CancellationToken) -> Result<(), ConsumerError> {
        while !cancel.is_cancelled() {
            if self.process_next().await?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Claim and fully process one job. `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<JobOutcome>, ConsumerError> {
        let Some(job) = self.queue.claim_next(&self.worker_name).await? else {
            return Ok(None);
        };

        tracing::debug!(
            job_id = job.id,
            job_type = %job.job_type,
            attempts = job.attempts,
            "Job claimed",
        );
        self.process(job).await.map(Some)
    }

    async fn process(&self, job: QueuedJob) -> Result<JobOutcome, ConsumerError> {
        let run_id = match job.run_id() {
            Ok(id) => id,
            Err(e) => return self.reject(&job, &e.to_string()).await,
        };

        let run = match self.ledger.get_by_id(run_id).await {
            Ok(run) => run,
            Err(CoreError::NotFound { .. }) => {
                return self.reject(&job, &format!("run {run_id} does not exist")).await;
            }
            // Rejecting frees the run for the orphan sweep.
            Err(e) => {
                self.reject(&job, &e.to_string()).await?;
                return Err(e.into());
            }
        };

        if run.status != RunStatus::Queued {
            return self.skip(&job, &run).await;
        }

        let run = match self
            .ledger
            .report_status(run_id, RunStatus::Running, StatusReport::default())
            .await
        {
            Ok(run) => run,
            Err(CoreError::InvalidTransition { .. }) => return self.skip(&job, &run).await,
            Err(e) => {
                self.reject(&job, &e.to_string()).await?;
                return Err(e.into());
            }
        };

        match self.execute(&run).await {
            Ok(outcome) => {
                self.queue.acknowledge(job.id).await?;
                Ok(outcome)
            }
            // The run stays RUNNING; the rejection reason records the failure.
            Err(e) => {
                self.reject(&job, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    /// Execute a RUNNING run and record its terminal status.
    async fn execute(&self, run: &ModuleRun) -> Result<JobOutcome, ConsumerError> {
        let result = match self.executors.get(&run.module_key) {
            Some(executor) => executor.execute(run).await.map_err(|e| e.to_string()),
            None => Err(format!(
                "No executor registered for module '{}' version '{}'",
                run.module_key, run.module_version
            )),
        };

        let (next, report) = match result {
            Ok(output) => (RunStatus::Completed, StatusReport::completed(output)),
            Err(message) => (RunStatus::Failed, StatusReport::failed(message)),
        };

        if let Err(e) = self.ledger.report_status(run.id, next, report).await {
            tracing::error!(
                run_id = run.id,
                module_key = %run.module_key,
                to = %next,
                error = %e,
                "Failed to record terminal status",
            );
            return Err(e.into());
        }

        Ok(match next {
            RunStatus::Completed => JobOutcome::Completed { run_id: run.id },
            _ => JobOutcome::Failed { run_id: run.id },
        })
    }

    async fn skip(&self, job: &QueuedJob, run: &ModuleRun) -> Result<JobOutcome, ConsumerError> {
        tracing::info!(
            job_id = job.id,
            run_id = run.id,
            status = %run.status,
            "Run already picked up, acknowledging duplicate job",
        );
        self.queue.acknowledge(job.id).await?;
        Ok(JobOutcome::Skipped { run_id: run.id })
    }

    async fn reject(&self, job: &QueuedJob, reason: &str) -> Result<JobOutcome, ConsumerError> {
        tracing::warn!(job_id = job.id, reason, "Rejecting job");
        self.queue.reject(job.id, reason).await?;
        Ok(JobOutcome::Rejected { job_id: job.id })
    }
}
