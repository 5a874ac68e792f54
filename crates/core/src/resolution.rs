//! Version resolution: pick the concrete enabled definition a run binds to.
//!
//! With an explicit version, only an enabled `(module_key, version)` row
//! qualifies. Without one, the enabled row with the greatest
//! `(created_at, id)` wins. The id tie-break keeps repeated resolutions
//! stable when two rows share a creation timestamp.

use std::sync::Arc;

use crate::error::CoreError;
use crate::modules::ModuleDefinition;
use crate::registry::{ModuleRegistry, ModuleStore};

/// Pick the latest enabled definition from `candidates`.
pub fn pick_latest(candidates: &[ModuleDefinition]) -> Option<&ModuleDefinition> {
    candidates
        .iter()
        .filter(|d| d.is_enabled)
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Resolves module keys to concrete enabled definitions.
#[derive(Clone)]
pub struct VersionResolver {
    store: Arc<dyn ModuleStore>,
}

impl VersionResolver {
    pub fn new(registry: &ModuleRegistry) -> Self {
        Self {
            store: Arc::clone(registry.store()),
        }
    }

    pub async fn resolve(
        &self,
        module_key: &str,
        explicit_version: Option<&str>,
    ) -> Result<ModuleDefinition, CoreError> {
        let not_found = || CoreError::ModuleNotFound {
            module_key: module_key.to_string(),
            version: explicit_version.map(str::to_string),
        };

        let resolved = match explicit_version {
            Some(version) => self
                .store
                .find_by_key_version(module_key, version)
                .await?
                .filter(|d| d.is_enabled),
            None => {
                let enabled = self.store.list_enabled_by_key(module_key).await?;
                pick_latest(&enabled).cloned()
            }
        };

        let definition = resolved.ok_or_else(not_found)?;
        tracing::debug!(
            module_key,
            requested_version = explicit_version,
            module_version = %definition.version,
            "Module version resolved",
        );
        Ok(definition)
    }
}
