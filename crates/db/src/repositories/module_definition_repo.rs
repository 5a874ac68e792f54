//! Repository for the `module_definitions` table.

use leadgraph_core::modules::{ModuleFilter, ModuleUpdate, NewModuleDefinition};
use leadgraph_core::types::DbId;
use sqlx::PgPool;

use crate::models::module_definition::ModuleDefinitionRow;

/// Column list for `module_definitions` queries.
const COLUMNS: &str = "\
    id, module_key, module_type, scope, version, config_schema, \
    is_enabled, created_at, updated_at";

/// Unique constraint guarding `(module_key, version)`.
pub const KEY_VERSION_CONSTRAINT: &str = "uq_module_definitions_key_version";

/// Provides CRUD operations for module definitions. Rows are never deleted.
pub struct ModuleDefinitionRepo;

impl ModuleDefinitionRepo {
    pub async fn create(
        pool: &PgPool,
        input: &NewModuleDefinition,
    ) -> Result<ModuleDefinitionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO module_definitions \
                (module_key, module_type, scope, version, config_schema, is_enabled) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModuleDefinitionRow>(&query)
            .bind(&input.module_key)
            .bind(input.module_type.as_str())
            .bind(input.scope.as_str())
            .bind(&input.version)
            .bind(&input.config_schema)
            .bind(input.is_enabled)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ModuleDefinitionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM module_definitions WHERE id = $1");
        sqlx::query_as::<_, ModuleDefinitionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_key_version(
        pool: &PgPool,
        module_key: &str,
        version: &str,
    ) -> Result<Option<ModuleDefinitionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM module_definitions \
             WHERE module_key = $1 AND version = $2"
        );
        sqlx::query_as::<_, ModuleDefinitionRow>(&query)
            .bind(module_key)
            .bind(version)
            .fetch_optional(pool)
            .await
    }

    /// List definitions matching every set filter field, ordered by key then
    /// creation time.
    pub async fn list(
        pool: &PgPool,
        filter: &ModuleFilter,
    ) -> Result<Vec<ModuleDefinitionRow>, sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if filter.module_key.is_some() {
            conditions.push(format!("module_key = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.module_type.is_some() {
            conditions.push(format!("module_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.is_enabled.is_some() {
            conditions.push(format!("is_enabled = ${bind_idx}"));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM module_definitions {where_clause} \
             ORDER BY module_key, created_at, id"
        );

        let mut q = sqlx::query_as::<_, ModuleDefinitionRow>(&query);
        if let Some(ref key) = filter.module_key {
            q = q.bind(key);
        }
        if let Some(module_type) = filter.module_type {
            q = q.bind(module_type.as_str());
        }
        if let Some(is_enabled) = filter.is_enabled {
            q = q.bind(is_enabled);
        }
        q.fetch_all(pool).await
    }

    pub async fn list_enabled_by_key(
        pool: &PgPool,
        module_key: &str,
    ) -> Result<Vec<ModuleDefinitionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM module_definitions \
             WHERE module_key = $1 AND is_enabled \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ModuleDefinitionRow>(&query)
            .bind(module_key)
            .fetch_all(pool)
            .await
    }

    /// Apply the set fields of `input`. Returns `None` if no row has `id`.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &ModuleUpdate,
    ) -> Result<Option<ModuleDefinitionRow>, sqlx::Error> {
        let query = format!(
            "UPDATE module_definitions SET \
                is_enabled = COALESCE($2, is_enabled), \
                config_schema = COALESCE($3, config_schema) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModuleDefinitionRow>(&query)
            .bind(id)
            .bind(input.is_enabled)
            .bind(&input.config_schema)
            .fetch_optional(pool)
            .await
    }
}
