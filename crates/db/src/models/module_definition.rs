//! Module definition rows (`module_definitions`).

use leadgraph_core::error::CoreError;
use leadgraph_core::modules::ModuleDefinition;
use leadgraph_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `module_definitions` table.
///
/// `module_type` and `scope` are stored as their SCREAMING_SNAKE_CASE names
/// and guarded by CHECK constraints.
#[derive(Debug, Clone, FromRow)]
pub struct ModuleDefinitionRow {
    pub id: DbId,
    pub module_key: String,
    pub module_type: String,
    pub scope: String,
    pub version: String,
    pub config_schema: serde_json::Value,
    pub is_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ModuleDefinitionRow> for ModuleDefinition {
    type Error = CoreError;

    fn try_from(row: ModuleDefinitionRow) -> Result<Self, Self::Error> {
        let module_type = row
            .module_type
            .parse()
            .map_err(|e| CoreError::Internal(format!("module_definitions.id {}: {e}", row.id)))?;
        let scope = row
            .scope
            .parse()
            .map_err(|e| CoreError::Internal(format!("module_definitions.id {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            module_key: row.module_key,
            module_type,
            scope,
            version: row.version,
            config_schema: row.config_schema,
            is_enabled: row.is_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
