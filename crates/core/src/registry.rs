//! Module registry: the single write path for module definitions.
//!
//! Definitions are never hard-deleted here; disabling is the retirement path.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{entity, CoreError};
use crate::modules::{ModuleDefinition, ModuleFilter, ModuleUpdate, NewModuleDefinition};
use crate::types::DbId;

/// Persistence port for module definitions.
///
/// `insert` must fail with [`CoreError::DuplicateDefinition`] when the
/// `(module_key, version)` pair already exists.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn insert(&self, input: &NewModuleDefinition) -> Result<ModuleDefinition, CoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<ModuleDefinition>, CoreError>;

    async fn find_by_key_version(
        &self,
        module_key: &str,
        version: &str,
    ) -> Result<Option<ModuleDefinition>, CoreError>;

    async fn list(&self, filter: &ModuleFilter) -> Result<Vec<ModuleDefinition>, CoreError>;

    /// All enabled definitions sharing `module_key`, in any order.
    async fn list_enabled_by_key(&self, module_key: &str)
        -> Result<Vec<ModuleDefinition>, CoreError>;

    /// Apply a partial update. Returns `None` if no row has that id.
    async fn update(
        &self,
        id: DbId,
        update: &ModuleUpdate,
    ) -> Result<Option<ModuleDefinition>, CoreError>;
}

/// Catalog of known module definitions. Shared by handle, never global.
#[derive(Clone)]
pub struct ModuleRegistry {
    store: Arc<dyn ModuleStore>,
}

impl ModuleRegistry {
    pub fn new(store: Arc<dyn ModuleStore>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &Arc<dyn ModuleStore> {
        &self.store
    }

    /// Insert a new definition.
    ///
    /// Fails with `DuplicateDefinition` if `(module_key, version)` exists.
    /// Callers that want idempotency (the seeder) check first via [`Self::find`].
    pub async fn register(
        &self,
        input: NewModuleDefinition,
    ) -> Result<ModuleDefinition, CoreError> {
        input.check()?;

        if self
            .store
            .find_by_key_version(&input.module_key, &input.version)
            .await?
            .is_some()
        {
            return Err(CoreError::DuplicateDefinition {
                module_key: input.module_key,
                version: input.version,
            });
        }

        let created = self.store.insert(&input).await?;
        tracing::info!(
            module_id = created.id,
            module_key = %created.module_key,
            module_version = %created.version,
            module_type = %created.module_type,
            scope = %created.scope,
            is_enabled = created.is_enabled,
            "Module registered",
        );
        Ok(created)
    }

    /// Look up an exact `(module_key, version)` pair regardless of enabled state.
    pub async fn find(
        &self,
        module_key: &str,
        version: &str,
    ) -> Result<Option<ModuleDefinition>, CoreError> {
        self.store.find_by_key_version(module_key, version).await
    }

    pub async fn get(&self, id: DbId) -> Result<ModuleDefinition, CoreError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found(entity::MODULE_DEFINITION, id))
    }

    pub async fn list(&self, filter: &ModuleFilter) -> Result<Vec<ModuleDefinition>, CoreError> {
        self.store.list(filter).await
    }

    /// Partial update of the enabled flag and/or config schema.
    pub async fn update(
        &self,
        id: DbId,
        update: ModuleUpdate,
    ) -> Result<ModuleDefinition, CoreError> {
        if update.is_empty() {
            return Err(CoreError::Validation(
                "Update must set is_enabled or config_schema".into(),
            ));
        }

        let updated = self
            .store
            .update(id, &update)
            .await?
            .ok_or_else(|| CoreError::not_found(entity::MODULE_DEFINITION, id))?;

        tracing::info!(
            module_id = id,
            module_key = %updated.module_key,
            module_version = %updated.version,
            is_enabled = updated.is_enabled,
            schema_changed = update.config_schema.is_some(),
            "Module updated",
        );
        Ok(updated)
    }

    pub async fn set_enabled(
        &self,
        id: DbId,
        is_enabled: bool,
    ) -> Result<ModuleDefinition, CoreError> {
        self.update(
            id,
            ModuleUpdate {
                is_enabled: Some(is_enabled),
                config_schema: None,
            },
        )
        .await
    }

    pub async fn update_config_schema(
        &self,
        id: DbId,
        schema: serde_json::Value,
    ) -> Result<ModuleDefinition, CoreError> {
        self.update(
            id,
            ModuleUpdate {
                is_enabled: None,
                config_schema: Some(schema),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::memory::MemoryModuleStore;
    use crate::modules::{ModuleScope, ModuleType};

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(Arc::new(MemoryModuleStore::default()))
    }

    fn def(
        key: &str,
        version: &str,
        module_type: ModuleType,
        enabled: bool,
    ) -> NewModuleDefinition {
        NewModuleDefinition {
            module_key: key.into(),
            module_type,
            scope: ModuleScope::PersonLevel,
            version: version.into(),
            config_schema: serde_json::json!({}),
            is_enabled: enabled,
        }
    }

    #[tokio::test]
    async fn second_register_is_duplicate_and_adds_no_row() {
        let registry = registry();
        registry
            .register(def("x-composer", "v1", ModuleType::Composer, true))
            .await
            .unwrap();

        let err = registry
            .register(def("x-composer", "v1", ModuleType::Composer, false))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            CoreError::DuplicateDefinition { ref module_key, ref version }
                if module_key == "x-composer" && version == "v1"
        );

        let all = registry.list(&ModuleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_enabled);
    }

    #[tokio::test]
    async fn register_keeps_caller_enabled_flag() {
        let registry = registry();
        let created = registry
            .register(def("quiet-enricher", "v1", ModuleType::Enricher, false))
            .await
            .unwrap();
        assert!(!created.is_enabled);
    }

    #[tokio::test]
    async fn register_rejects_malformed_key() {
        let registry = registry();
        let err = registry
            .register(def("Bad Key", "v1", ModuleType::Enricher, true))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[tokio::test]
    async fn list_filters_combine() {
        let registry = registry();
        registry.register(def("a-connector", "v1", ModuleType::Connector, true)).await.unwrap();
        registry.register(def("a-connector", "v2", ModuleType::Connector, false)).await.unwrap();
        registry.register(def("b-enricher", "v1", ModuleType::Enricher, true)).await.unwrap();

        let enabled_connectors = registry
            .list(&ModuleFilter {
                module_key: None,
                module_type: Some(ModuleType::Connector),
                is_enabled: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(enabled_connectors.len(), 1);
        assert_eq!(enabled_connectors[0].version, "v1");

        let by_key = registry
            .list(&ModuleFilter {
                module_key: Some("a-connector".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_key.len(), 2);
    }

    #[tokio::test]
    async fn set_enabled_and_schema_update() {
        let registry = registry();
        let created = registry
            .register(def("x-composer", "v1", ModuleType::Composer, true))
            .await
            .unwrap();

        let disabled = registry.set_enabled(created.id, false).await.unwrap();
        assert!(!disabled.is_enabled);
        assert_eq!(disabled.config_schema, serde_json::json!({}));

        let schema = serde_json::json!({ "type": "object", "required": ["tone"] });
        let updated = registry
            .update_config_schema(created.id, schema.clone())
            .await
            .unwrap();
        assert_eq!(updated.config_schema, schema);
        assert!(!updated.is_enabled);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let registry = registry();
        let err = registry.set_enabled(404, true).await.unwrap_err();
        assert_matches!(
            err,
            CoreError::NotFound { entity: "ModuleDefinition", id: 404 }
        );
    }

    #[tokio::test]
    async fn empty_update_rejected() {
        let registry = registry();
        let created = registry
            .register(def("x-composer", "v1", ModuleType::Composer, true))
            .await
            .unwrap();
        let err = registry
            .update(created.id, ModuleUpdate::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }
}
