//! Run ledger: creates, queries, and advances module runs.
//!
//! The ledger is the only creation path for runs. Every run passes version
//! resolution and scope validation first, and is stored QUEUED with the
//! resolved version frozen into the row. Status beyond QUEUED only moves
//! through [`RunLedger::report_status`], which the worker calls.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{entity, CoreError};
use crate::resolution::VersionResolver;
use crate::runs::{
    validate_transition, ModuleRun, NewModuleRun, RunFilter, RunListLimits, RunQuery, RunStatus,
    StatusReport,
};
use crate::scope::ScopeValidator;
use crate::types::{DbId, Timestamp};

/// Persistence port for module runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a run in status QUEUED.
    async fn insert(&self, run: &NewModuleRun) -> Result<ModuleRun, CoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<ModuleRun>, CoreError>;

    /// Matching runs, newest first (`created_at DESC, id DESC`).
    async fn list(&self, query: &RunQuery) -> Result<Vec<ModuleRun>, CoreError>;

    /// Move a run from `from` to `to` only if it is currently in `from`.
    ///
    /// Returns `None` when the row is missing or no longer in `from`.
    async fn transition(
        &self,
        id: DbId,
        from: RunStatus,
        to: RunStatus,
        report: &StatusReport,
    ) -> Result<Option<ModuleRun>, CoreError>;

    /// QUEUED runs created before `cutoff`, oldest first.
    async fn list_queued_before(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<ModuleRun>, CoreError>;

    async fn health_check(&self) -> Result<(), CoreError>;
}

/// A request to create one run.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRunRequest {
    pub project_id: DbId,
    pub person_id: Option<DbId>,
    pub triggered_by_user_id: DbId,
    pub module_key: String,
    pub version: Option<String>,
    pub input_config: serde_json::Value,
}

impl CreateRunRequest {
    pub fn for_person(
        project_id: DbId,
        person_id: DbId,
        triggered_by_user_id: DbId,
        module_key: impl Into<String>,
        version: Option<String>,
        input_config: serde_json::Value,
    ) -> Self {
        Self {
            project_id,
            person_id: Some(person_id),
            triggered_by_user_id,
            module_key: module_key.into(),
            version,
            input_config,
        }
    }

    pub fn for_project(
        project_id: DbId,
        triggered_by_user_id: DbId,
        module_key: impl Into<String>,
        version: Option<String>,
        input_config: serde_json::Value,
    ) -> Self {
        Self {
            project_id,
            person_id: None,
            triggered_by_user_id,
            module_key: module_key.into(),
            version,
            input_config,
        }
    }
}

#[derive(Clone)]
pub struct RunLedger {
    store: Arc<dyn RunStore>,
    resolver: VersionResolver,
    validator: ScopeValidator,
    limits: RunListLimits,
}

impl RunLedger {
    pub fn new(
        store: Arc<dyn RunStore>,
        resolver: VersionResolver,
        validator: ScopeValidator,
        limits: RunListLimits,
    ) -> Self {
        Self {
            store,
            resolver,
            validator,
            limits,
        }
    }

    pub fn limits(&self) -> RunListLimits {
        self.limits
    }

    /// Resolve, validate, then persist a QUEUED run.
    ///
    /// Nothing is written if resolution or validation fails.
    pub async fn create_run(&self, request: CreateRunRequest) -> Result<ModuleRun, CoreError> {
        let definition = self
            .resolver
            .resolve(&request.module_key, request.version.as_deref())
            .await?;

        self.validator
            .validate(
                request.project_id,
                request.person_id,
                request.triggered_by_user_id,
                &definition,
            )
            .await?;

        let run = self
            .store
            .insert(&NewModuleRun {
                project_id: request.project_id,
                person_id: request.person_id,
                triggered_by_user_id: request.triggered_by_user_id,
                module_key: definition.module_key,
                module_version: definition.version,
                input_config: request.input_config,
            })
            .await?;

        tracing::info!(
            run_id = run.id,
            project_id = run.project_id,
            person_id = run.person_id,
            module_key = %run.module_key,
            module_version = %run.module_version,
            user_id = run.triggered_by_user_id,
            "Module run created",
        );
        Ok(run)
    }

    pub async fn get_by_id(&self, run_id: DbId) -> Result<ModuleRun, CoreError> {
        self.store
            .find_by_id(run_id)
            .await?
            .ok_or_else(|| CoreError::not_found(entity::MODULE_RUN, run_id))
    }

    /// Runs for a project (and person, when given), newest first, with the
    /// page size clamped to the configured bounds.
    pub async fn list(
        &self,
        project_id: DbId,
        person_id: Option<DbId>,
        filter: &RunFilter,
    ) -> Result<Vec<ModuleRun>, CoreError> {
        let query = RunQuery {
            project_id,
            person_id,
            status: filter.status,
            module_key: filter.module_key.clone(),
            limit: self.limits.clamp(filter.limit),
        };
        self.store.list(&query).await
    }

    /// Worker-only status path.
    ///
    /// Enforces QUEUED -> RUNNING -> COMPLETED | FAILED. A concurrent writer
    /// that already moved the run makes this call fail rather than overwrite.
    pub async fn report_status(
        &self,
        run_id: DbId,
        next: RunStatus,
        report: StatusReport,
    ) -> Result<ModuleRun, CoreError> {
        let current = self.get_by_id(run_id).await?;
        validate_transition(run_id, current.status, next)?;

        let updated = self
            .store
            .transition(run_id, current.status, next, &report)
            .await?
            .ok_or(CoreError::InvalidTransition {
                run_id,
                from: current.status.as_str(),
                to: next.as_str(),
            })?;

        match next {
            RunStatus::Failed => tracing::warn!(
                run_id,
                module_key = %updated.module_key,
                module_version = %updated.module_version,
                error = updated.error_message.as_deref().unwrap_or(""),
                "Module run failed",
            ),
            _ => tracing::info!(
                run_id,
                module_key = %updated.module_key,
                from = %current.status,
                to = %next,
                "Module run status changed",
            ),
        }
        Ok(updated)
    }

    /// QUEUED runs older than `cutoff`, candidates for re-dispatch.
    pub async fn list_stale_queued(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<ModuleRun>, CoreError> {
        self.store.list_queued_before(cutoff, limit.max(1)).await
    }

    pub async fn health_check(&self) -> Result<(), CoreError> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::engine::{Backends, Engine};
    use crate::memory::MemoryDirectory;
    use crate::modules::{ModuleFilter, ModuleScope, ModuleType, NewModuleDefinition};

    async fn engine() -> Engine {
        let directory = MemoryDirectory::default();
        directory.add_project(1).await;
        directory.add_person(1, 7).await;
        directory.add_person(1, 8).await;
        directory.add_user(2).await;
        Engine::new(
            Backends::in_memory_with_directory(directory),
            RunListLimits::default(),
        )
    }

    fn module(key: &str, scope: ModuleScope, version: &str, enabled: bool) -> NewModuleDefinition {
        NewModuleDefinition {
            module_key: key.into(),
            module_type: ModuleType::Composer,
            scope,
            version: version.into(),
            config_schema: serde_json::json!({}),
            is_enabled: enabled,
        }
    }

    fn person_run(key: &str) -> CreateRunRequest {
        CreateRunRequest::for_person(1, 7, 2, key, None, serde_json::json!({}))
    }

    #[tokio::test]
    async fn person_run_is_queued_with_frozen_version() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();

        let run = engine.ledger.create_run(person_run("x-composer")).await.unwrap();
        assert_eq!(run.module_version, "v1");
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.person_id, Some(7));
        assert_eq!(run.project_id, 1);
    }

    #[tokio::test]
    async fn no_enabled_definition_is_module_not_found() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", false))
            .await
            .unwrap();

        let err = engine.ledger.create_run(person_run("x-composer")).await.unwrap_err();
        assert_matches!(err, CoreError::ModuleNotFound { .. });
    }

    #[tokio::test]
    async fn project_module_with_person_is_mismatch_and_writes_nothing() {
        let engine = engine().await;
        engine
            .registry
            .register(module("y-connector", ModuleScope::ProjectLevel, "v1", true))
            .await
            .unwrap();

        let err = engine.ledger.create_run(person_run("y-connector")).await.unwrap_err();
        assert_matches!(err, CoreError::ScopeMismatch(_));

        let runs = engine.ledger.list(1, None, &RunFilter::default()).await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn disabling_keeps_historical_binding() {
        let engine = engine().await;
        let v1 = engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();
        let run = engine.ledger.create_run(person_run("x-composer")).await.unwrap();

        engine.registry.set_enabled(v1.id, false).await.unwrap();
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v2", true))
            .await
            .unwrap();

        let fetched = engine.ledger.get_by_id(run.id).await.unwrap();
        assert_eq!(fetched.module_version, "v1");

        let next = engine.ledger.create_run(person_run("x-composer")).await.unwrap();
        assert_eq!(next.module_version, "v2");
    }

    #[tokio::test]
    async fn list_returns_newest_first_within_limit() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();

        let mut ids = Vec::new();
        for _ in 0..8 {
            ids.push(engine.ledger.create_run(person_run("x-composer")).await.unwrap().id);
        }

        let filter = RunFilter {
            limit: Some(5),
            ..Default::default()
        };
        let runs = engine.ledger.list(1, Some(7), &filter).await.unwrap();
        let listed: Vec<DbId> = runs.iter().map(|r| r.id).collect();
        let expected: Vec<DbId> = ids.iter().rev().take(5).copied().collect();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn list_scopes_to_person_and_filters() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();
        engine
            .registry
            .register(module("y-connector", ModuleScope::ProjectLevel, "v1", true))
            .await
            .unwrap();

        engine.ledger.create_run(person_run("x-composer")).await.unwrap();
        engine
            .ledger
            .create_run(CreateRunRequest::for_person(
                1,
                8,
                2,
                "x-composer",
                None,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        engine
            .ledger
            .create_run(CreateRunRequest::for_project(
                1,
                2,
                "y-connector",
                None,
                serde_json::json!({}),
            ))
            .await
            .unwrap();

        let person7 = engine.ledger.list(1, Some(7), &RunFilter::default()).await.unwrap();
        assert_eq!(person7.len(), 1);

        let project = engine.ledger.list(1, None, &RunFilter::default()).await.unwrap();
        assert_eq!(project.len(), 3);

        let connectors = engine
            .ledger
            .list(
                1,
                None,
                &RunFilter {
                    module_key: Some("y-connector".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].person_id, None);
    }

    #[tokio::test]
    async fn list_limit_is_clamped_to_max() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();
        for _ in 0..3 {
            engine.ledger.create_run(person_run("x-composer")).await.unwrap();
        }

        let filter = RunFilter {
            limit: Some(10_000),
            ..Default::default()
        };
        let runs = engine.ledger.list(1, Some(7), &filter).await.unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(engine.ledger.limits().clamp(Some(10_000)), 100);
    }

    #[tokio::test]
    async fn report_status_walks_the_state_machine() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();
        let run = engine.ledger.create_run(person_run("x-composer")).await.unwrap();

        let err = engine
            .ledger
            .report_status(run.id, RunStatus::Completed, StatusReport::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { from: "QUEUED", to: "COMPLETED", .. });

        let running = engine
            .ledger
            .report_status(run.id, RunStatus::Running, StatusReport::default())
            .await
            .unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.started_at.is_some());

        let done = engine
            .ledger
            .report_status(
                run.id,
                RunStatus::Completed,
                StatusReport::completed(serde_json::json!({ "score": 0.8 })),
            )
            .await
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.output, Some(serde_json::json!({ "score": 0.8 })));

        let err = engine
            .ledger
            .report_status(run.id, RunStatus::Failed, StatusReport::failed("late"))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { from: "COMPLETED", .. });
    }

    #[tokio::test]
    async fn failed_report_records_message() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();
        let run = engine.ledger.create_run(person_run("x-composer")).await.unwrap();
        engine
            .ledger
            .report_status(run.id, RunStatus::Running, StatusReport::default())
            .await
            .unwrap();
        let failed = engine
            .ledger
            .report_status(run.id, RunStatus::Failed, StatusReport::failed("LLM timeout"))
            .await
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("LLM timeout"));
    }

    #[tokio::test]
    async fn get_unknown_run_is_not_found() {
        let engine = engine().await;
        let err = engine.ledger.get_by_id(123).await.unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "ModuleRun", id: 123 });
    }

    #[tokio::test]
    async fn registry_listing_unaffected_by_runs() {
        let engine = engine().await;
        engine
            .registry
            .register(module("x-composer", ModuleScope::PersonLevel, "v1", true))
            .await
            .unwrap();
        engine.ledger.create_run(person_run("x-composer")).await.unwrap();
        let defs = engine.registry.list(&ModuleFilter::default()).await.unwrap();
        assert_eq!(defs.len(), 1);
    }
}
