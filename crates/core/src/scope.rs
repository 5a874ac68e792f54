//! Scope validation for run requests.
//!
//! Runs before any row is written: an invalid scope never produces a run.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{entity, CoreError};
use crate::modules::{ModuleDefinition, ModuleScope};
use crate::types::DbId;

/// Read-only lookups against entities owned outside this core.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn project_exists(&self, project_id: DbId) -> Result<bool, CoreError>;

    /// Whether `person_id` exists and belongs to `project_id`.
    async fn person_in_project(&self, project_id: DbId, person_id: DbId) -> Result<bool, CoreError>;

    async fn user_exists(&self, user_id: DbId) -> Result<bool, CoreError>;
}

/// Check the person/scope shape of a request without touching storage.
///
/// A person supplied to a project-level module is a caller error, not
/// something to ignore. A person-level module without a person is the
/// mirror-image error.
pub fn check_scope_shape(
    definition: &ModuleDefinition,
    person_id: Option<DbId>,
) -> Result<(), CoreError> {
    match (definition.scope, person_id) {
        (ModuleScope::PersonLevel, Some(_)) | (ModuleScope::ProjectLevel, None) => Ok(()),
        (ModuleScope::ProjectLevel, Some(person_id)) => Err(CoreError::ScopeMismatch(format!(
            "Module '{}' version '{}' is PROJECT_LEVEL and cannot run against person {person_id}",
            definition.module_key, definition.version,
        ))),
        (ModuleScope::PersonLevel, None) => Err(CoreError::ScopeMismatch(format!(
            "Module '{}' version '{}' is PERSON_LEVEL and requires a person",
            definition.module_key, definition.version,
        ))),
    }
}

#[derive(Clone)]
pub struct ScopeValidator {
    directory: Arc<dyn EntityDirectory>,
}

impl ScopeValidator {
    pub fn new(directory: Arc<dyn EntityDirectory>) -> Self {
        Self { directory }
    }

    /// Validate the entities referenced by a run request against the
    /// resolved module's scope.
    pub async fn validate(
        &self,
        project_id: DbId,
        person_id: Option<DbId>,
        triggered_by_user_id: DbId,
        definition: &ModuleDefinition,
    ) -> Result<(), CoreError> {
        check_scope_shape(definition, person_id)?;

        if !self.directory.project_exists(project_id).await? {
            return Err(CoreError::not_found(entity::PROJECT, project_id));
        }

        if let Some(person_id) = person_id {
            if !self.directory.person_in_project(project_id, person_id).await? {
                return Err(CoreError::not_found(entity::PERSON, person_id));
            }
        }

        if !self.directory.user_exists(triggered_by_user_id).await? {
            return Err(CoreError::not_found(entity::USER, triggered_by_user_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::MemoryDirectory;
    use crate::modules::ModuleType;

    fn definition(scope: ModuleScope) -> ModuleDefinition {
        let now = chrono::Utc::now();
        ModuleDefinition {
            id: 1,
            module_key: "x-composer".into(),
            module_type: ModuleType::Composer,
            scope,
            version: "v1".into(),
            config_schema: serde_json::json!({}),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn validator() -> ScopeValidator {
        let directory = MemoryDirectory::default();
        directory.add_project(1).await;
        directory.add_person(1, 7).await;
        directory.add_project(2).await;
        directory.add_user(2).await;
        ScopeValidator::new(Arc::new(directory))
    }

    #[tokio::test]
    async fn person_level_happy_path() {
        let v = validator().await;
        v.validate(1, Some(7), 2, &definition(ModuleScope::PersonLevel))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn project_level_happy_path() {
        let v = validator().await;
        v.validate(1, None, 2, &definition(ModuleScope::ProjectLevel))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn person_on_project_module_is_mismatch_even_if_unknown() {
        let v = validator().await;
        let def = definition(ModuleScope::ProjectLevel);

        let real = v.validate(1, Some(7), 2, &def).await.unwrap_err();
        assert_matches!(real, CoreError::ScopeMismatch(_));

        let bogus = v.validate(1, Some(99_999), 2, &def).await.unwrap_err();
        assert_matches!(bogus, CoreError::ScopeMismatch(_));
    }

    #[tokio::test]
    async fn person_module_without_person_is_mismatch() {
        let v = validator().await;
        let err = v
            .validate(1, None, 2, &definition(ModuleScope::PersonLevel))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::ScopeMismatch(_));
    }

    #[tokio::test]
    async fn missing_project() {
        let v = validator().await;
        let err = v
            .validate(50, None, 2, &definition(ModuleScope::ProjectLevel))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Project", id: 50 });
    }

    #[tokio::test]
    async fn person_from_another_project_is_not_found() {
        let v = validator().await;
        let err = v
            .validate(2, Some(7), 2, &definition(ModuleScope::PersonLevel))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "Person", id: 7 });
    }

    #[tokio::test]
    async fn missing_actor() {
        let v = validator().await;
        let err = v
            .validate(1, Some(7), 3, &definition(ModuleScope::PersonLevel))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "User", id: 3 });
    }
}
