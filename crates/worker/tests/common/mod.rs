#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use leadgraph_core::engine::{Backends, Engine};
use leadgraph_core::error::CoreError;
use leadgraph_core::ledger::RunStore;
use leadgraph_core::memory::{MemoryDirectory, MemoryJobQueue, MemoryRunStore};
use leadgraph_core::modules::{ModuleScope, ModuleType, NewModuleDefinition};
use leadgraph_core::runs::{ModuleRun, RunListLimits};
use leadgraph_worker::executor::{ExecutionError, ModuleExecutor};
use serde_json::json;

pub const PROJECT_ID: i64 = 1;
pub const PERSON_ID: i64 = 7;
pub const USER_ID: i64 = 2;

pub struct Harness {
    pub engine: Engine,
    pub queue: Arc<MemoryJobQueue>,
}

/// In-memory engine with project 1, person 7, user 2, and an enabled
/// person-level `x-composer` v1.
pub async fn harness() -> Harness {
    harness_with_runs(Arc::new(MemoryRunStore::default())).await
}

/// Same as [`harness`], with runs kept in `runs`.
pub async fn harness_with_runs(runs: Arc<dyn RunStore>) -> Harness {
    let directory = MemoryDirectory::default();
    directory.add_project(PROJECT_ID).await;
    directory.add_person(PROJECT_ID, PERSON_ID).await;
    directory.add_user(USER_ID).await;

    let queue = Arc::new(MemoryJobQueue::default());
    let backends = Backends {
        runs,
        queue: queue.clone(),
        ..Backends::in_memory_with_directory(directory)
    };
    let engine = Engine::new(backends, RunListLimits::default());

    engine
        .registry
        .register(NewModuleDefinition {
            module_key: "x-composer".into(),
            module_type: ModuleType::Composer,
            scope: ModuleScope::PersonLevel,
            version: "v1".into(),
            config_schema: json!({}),
            is_enabled: true,
        })
        .await
        .unwrap();

    Harness { engine, queue }
}

impl Harness {
    /// Create and dispatch an `x-composer` run for person 7.
    pub async fn submit_run(&self) -> ModuleRun {
        self.submit_run_unchecked().await.unwrap()
    }

    pub async fn submit_run_unchecked(&self) -> Result<ModuleRun, CoreError> {
        self.engine
            .orchestrator
            .create_person_run(
                PROJECT_ID,
                PERSON_ID,
                USER_ID,
                "x-composer",
                None,
                json!({ "tone": "direct" }),
            )
            .await
    }
}

/// Echoes the run's input config back as output.
pub struct EchoExecutor;

#[async_trait]
impl ModuleExecutor for EchoExecutor {
    async fn execute(&self, run: &ModuleRun) -> Result<serde_json::Value, ExecutionError> {
        Ok(json!({ "echo": run.input_config }))
    }
}

/// Always fails as an upstream outage.
pub struct FailingExecutor;

#[async_trait]
impl ModuleExecutor for FailingExecutor {
    async fn execute(&self, _run: &ModuleRun) -> Result<serde_json::Value, ExecutionError> {
        Err(ExecutionError::Upstream("profile fetch returned 503".into()))
    }
}
