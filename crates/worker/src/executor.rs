//! Pluggable module logic.
//!
//! The worker only sequences runs; what a module actually does lives behind
//! [`ModuleExecutor`], registered per `module_key`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use leadgraph_core::runs::ModuleRun;

/// Why a module execution did not produce output. The display text becomes
/// the run's `error_message`.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Invalid input config: {0}")]
    InvalidInput(String),

    #[error("Upstream source failed: {0}")]
    Upstream(String),

    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait ModuleExecutor: Send + Sync {
    /// Run the module against `run.input_config`, returning its output.
    async fn execute(&self, run: &ModuleRun) -> Result<serde_json::Value, ExecutionError>;
}

/// Executors by `module_key`. One executor serves every version of a key;
/// it can branch on `run.module_version`.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn ModuleExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `module_key`, replacing any previous one.
    pub fn register(&mut self, module_key: impl Into<String>, executor: Arc<dyn ModuleExecutor>) {
        self.executors.insert(module_key.into(), executor);
    }

    pub fn with(
        mut self,
        module_key: impl Into<String>,
        executor: Arc<dyn ModuleExecutor>,
    ) -> Self {
        self.register(module_key, executor);
        self
    }

    pub fn get(&self, module_key: &str) -> Option<Arc<dyn ModuleExecutor>> {
        self.executors.get(module_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
