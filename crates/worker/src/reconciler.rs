//! Orphan sweep for runs whose dispatch was lost.
//!
//! A run left QUEUED by a `DispatchFailure` (or by a rejected job) has no
//! open job and would never execute. The same holds when a worker dies
//! between claiming a job and marking its run RUNNING. The sweep finds QUEUED
//! runs older than `orphan_age` and enqueues a job for each one with no
//! pending job and no claim younger than `orphan_age`.

use std::time::Duration;

use chrono::Utc;
use leadgraph_core::dispatch::DispatchGateway;
use leadgraph_core::error::CoreError;
use leadgraph_core::ledger::RunLedger;
use leadgraph_core::types::Timestamp;
use tokio_util::sync::CancellationToken;

use crate::config::ReconcileConfig;

pub struct OrphanReconciler {
    ledger: RunLedger,
    gateway: DispatchGateway,
    interval: Duration,
    orphan_age: Duration,
    batch_size: i64,
}

impl OrphanReconciler {
    pub fn new(ledger: RunLedger, gateway: DispatchGateway, config: &ReconcileConfig) -> Self {
        Self {
            ledger,
            gateway,
            interval: config.interval,
            orphan_age: config.orphan_age,
            batch_size: config.batch_size,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            orphan_age_secs = self.orphan_age.as_secs(),
            "Orphan reconciler started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Orphan reconciler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "Orphan sweep failed");
                    }
                }
            }
        }
    }

    /// Sweep runs older than the configured orphan age.
    pub async fn sweep(&self) -> Result<usize, CoreError> {
        let age = chrono::Duration::from_std(self.orphan_age)
            .map_err(|e| CoreError::Internal(format!("orphan age out of range: {e}")))?;
        self.sweep_before(Utc::now() - age).await
    }

    /// Re-enqueue QUEUED runs created before `cutoff` that have no pending
    /// job and no claim taken since `cutoff`. Returns how many were
    /// re-enqueued.
    pub async fn sweep_before(&self, cutoff: Timestamp) -> Result<usize, CoreError> {
        let stale = self.ledger.list_stale_queued(cutoff, self.batch_size).await?;
        let mut requeued = 0;

        for run in stale {
            if self.gateway.has_live_job(run.id, cutoff).await? {
                continue;
            }
            let job_id = self.gateway.enqueue(run.id).await?;
            tracing::info!(
                run_id = run.id,
                job_id,
                module_key = %run.module_key,
                module_version = %run.module_version,
                "Re-enqueued orphaned run",
            );
            requeued += 1;
        }

        if requeued > 0 {
            tracing::info!(requeued, "Orphan sweep complete");
        }
        Ok(requeued)
    }
}
