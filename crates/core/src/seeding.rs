//! Bootstrap seeding of the module registry.
//!
//! Additive only: an existing `(module_key, version)` row is never touched,
//! so a module an operator disabled stays disabled across restarts.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::modules::{ModuleScope, ModuleType, NewModuleDefinition};
use crate::registry::ModuleRegistry;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSeed {
    pub module_key: String,
    pub module_type: ModuleType,
    pub scope: ModuleScope,
    pub version: String,
    pub config_schema: serde_json::Value,
    pub is_enabled: bool,
}

impl From<&ModuleSeed> for NewModuleDefinition {
    fn from(seed: &ModuleSeed) -> Self {
        Self {
            module_key: seed.module_key.clone(),
            module_type: seed.module_type,
            scope: seed.scope,
            version: seed.version.clone(),
            config_schema: seed.config_schema.clone(),
            is_enabled: seed.is_enabled,
        }
    }
}

/// Outcome of a seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub seeded: usize,
    pub skipped: usize,
}

/// Insert every catalog entry that is not registered yet.
///
/// Any failure other than a lost insert race aborts the pass.
pub async fn seed_all(
    registry: &ModuleRegistry,
    catalog: &[ModuleSeed],
) -> Result<SeedReport, CoreError> {
    let mut report = SeedReport::default();

    for seed in catalog {
        if registry.find(&seed.module_key, &seed.version).await?.is_some() {
            report.skipped += 1;
            continue;
        }

        match registry.register(NewModuleDefinition::from(seed)).await {
            Ok(created) => {
                tracing::debug!(
                    module_id = created.id,
                    module_key = %created.module_key,
                    module_version = %created.version,
                    "Seeded module definition",
                );
                report.seeded += 1;
            }
            // Another process seeded the same row between check and insert.
            Err(CoreError::DuplicateDefinition { .. }) => report.skipped += 1,
            Err(e) => {
                tracing::error!(
                    module_key = %seed.module_key,
                    module_version = %seed.version,
                    error = %e,
                    "Module seeding aborted",
                );
                return Err(e);
            }
        }
    }

    tracing::info!(
        seeded = report.seeded,
        skipped = report.skipped,
        "Module catalog seeding complete",
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::catalog::default_catalog;
    use crate::memory::MemoryModuleStore;
    use crate::modules::ModuleFilter;

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(Arc::new(MemoryModuleStore::default()))
    }

    fn seed(key: &str) -> ModuleSeed {
        ModuleSeed {
            module_key: key.into(),
            module_type: ModuleType::Enricher,
            scope: ModuleScope::PersonLevel,
            version: "v1".into(),
            config_schema: serde_json::json!({}),
            is_enabled: true,
        }
    }

    #[tokio::test]
    async fn second_pass_skips_everything() {
        let registry = registry();
        let catalog = default_catalog();

        let first = seed_all(&registry, &catalog).await.unwrap();
        assert_eq!(first.seeded, catalog.len());
        assert_eq!(first.skipped, 0);

        let second = seed_all(&registry, &catalog).await.unwrap();
        assert_eq!(second.seeded, 0);
        assert_eq!(second.skipped, catalog.len());

        let all = registry.list(&ModuleFilter::default()).await.unwrap();
        assert_eq!(all.len(), catalog.len());
    }

    #[tokio::test]
    async fn seeding_never_re_enables() {
        let registry = registry();
        let catalog = vec![seed("profile-enricher")];
        seed_all(&registry, &catalog).await.unwrap();

        let row = registry.find("profile-enricher", "v1").await.unwrap().unwrap();
        registry.set_enabled(row.id, false).await.unwrap();

        seed_all(&registry, &catalog).await.unwrap();
        let row = registry.find("profile-enricher", "v1").await.unwrap().unwrap();
        assert!(!row.is_enabled);
    }

    #[tokio::test]
    async fn invalid_entry_aborts_pass() {
        let registry = registry();
        let catalog = vec![seed("good-enricher"), seed("Bad Key"), seed("late-enricher")];

        let err = seed_all(&registry, &catalog).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert!(registry.find("late-enricher", "v1").await.unwrap().is_none());
    }
}
