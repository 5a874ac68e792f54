//! Caller-facing run creation: commit the run, then dispatch it.

use crate::dispatch::DispatchGateway;
use crate::error::CoreError;
use crate::ledger::{CreateRunRequest, RunLedger};
use crate::runs::ModuleRun;
use crate::types::DbId;

/// Creates runs and hands them to the job queue.
///
/// The sequence is strictly two-phase: the run row is committed by the
/// ledger, then the job is published. If publishing fails the caller gets
/// [`CoreError::DispatchFailure`] with the id of the run left QUEUED.
#[derive(Clone)]
pub struct RunOrchestrator {
    ledger: RunLedger,
    gateway: DispatchGateway,
}

impl RunOrchestrator {
    pub fn new(ledger: RunLedger, gateway: DispatchGateway) -> Self {
        Self { ledger, gateway }
    }

    pub async fn submit(&self, request: CreateRunRequest) -> Result<ModuleRun, CoreError> {
        let run = self.ledger.create_run(request).await?;
        self.gateway.enqueue(run.id).await?;
        Ok(run)
    }

    pub async fn create_person_run(
        &self,
        project_id: DbId,
        person_id: DbId,
        triggered_by_user_id: DbId,
        module_key: &str,
        version: Option<String>,
        input_config: serde_json::Value,
    ) -> Result<ModuleRun, CoreError> {
        self.submit(CreateRunRequest::for_person(
            project_id,
            person_id,
            triggered_by_user_id,
            module_key,
            version,
            input_config,
        ))
        .await
    }

    pub async fn create_project_run(
        &self,
        project_id: DbId,
        triggered_by_user_id: DbId,
        module_key: &str,
        version: Option<String>,
        input_config: serde_json::Value,
    ) -> Result<ModuleRun, CoreError> {
        self.submit(CreateRunRequest::for_project(
            project_id,
            triggered_by_user_id,
            module_key,
            version,
            input_config,
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::dispatch::JobQueue;
    use crate::engine::{Backends, Engine};
    use crate::memory::{MemoryDirectory, MemoryJobQueue};
    use crate::modules::{ModuleScope, ModuleType, NewModuleDefinition};
    use crate::runs::{RunFilter, RunListLimits, RunStatus};

    async fn setup() -> (Engine, Arc<MemoryJobQueue>) {
        let directory = MemoryDirectory::default();
        directory.add_project(1).await;
        directory.add_person(1, 7).await;
        directory.add_user(2).await;

        let queue = Arc::new(MemoryJobQueue::default());
        let mut backends = Backends::in_memory_with_directory(directory);
        backends.queue = queue.clone();

        let engine = Engine::new(backends, RunListLimits::default());
        engine
            .registry
            .register(NewModuleDefinition {
                module_key: "x-composer".into(),
                module_type: ModuleType::Composer,
                scope: ModuleScope::PersonLevel,
                version: "v1".into(),
                config_schema: serde_json::json!({}),
                is_enabled: true,
            })
            .await
            .unwrap();
        (engine, queue)
    }

    #[tokio::test]
    async fn created_run_is_listed_and_dispatched() {
        let (engine, queue) = setup().await;
        let run = engine
            .orchestrator
            .create_person_run(1, 7, 2, "x-composer", None, serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.module_version, "v1");
        assert_eq!(run.person_id, Some(7));

        let listed = engine.ledger.list(1, Some(7), &RunFilter::default()).await.unwrap();
        assert!(listed.iter().any(|r| r.id == run.id));

        let job = queue.claim_next("test").await.unwrap().unwrap();
        assert_eq!(job.run_id().unwrap(), run.id);
    }

    #[tokio::test]
    async fn queue_outage_reports_dispatch_failure_with_run_id() {
        let (engine, queue) = setup().await;
        queue.set_available(false).await;

        let err = engine
            .orchestrator
            .create_person_run(1, 7, 2, "x-composer", None, serde_json::json!({}))
            .await
            .unwrap_err();

        let run_id = match err {
            CoreError::DispatchFailure { run_id, .. } => run_id,
            other => panic!("expected DispatchFailure, got {other:?}"),
        };
        let run = engine.ledger.get_by_id(run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn validation_failure_enqueues_nothing() {
        let (engine, queue) = setup().await;
        let err = engine
            .orchestrator
            .create_project_run(1, 2, "x-composer", None, serde_json::json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::ScopeMismatch(_));
        assert!(queue.claim_next("test").await.unwrap().is_none());
    }
}
