//! Handlers for the `/modules` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use leadgraph_core::modules::{
    ModuleFilter, ModuleScope, ModuleType, ModuleUpdate, NewModuleDefinition,
};
use leadgraph_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /api/v1/modules`.
///
/// New definitions start disabled unless the caller says otherwise.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterModuleRequest {
    pub module_key: String,
    pub module_type: ModuleType,
    pub scope: ModuleScope,
    pub version: String,
    #[serde(default = "empty_schema")]
    pub config_schema: serde_json::Value,
    #[serde(default)]
    pub is_enabled: bool,
}

fn empty_schema() -> serde_json::Value {
    serde_json::json!({})
}

impl From<RegisterModuleRequest> for NewModuleDefinition {
    fn from(req: RegisterModuleRequest) -> Self {
        Self {
            module_key: req.module_key,
            module_type: req.module_type,
            scope: req.scope,
            version: req.version,
            config_schema: req.config_schema,
            is_enabled: req.is_enabled,
        }
    }
}

/// Query parameters for `GET /api/v1/modules/resolve`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveQuery {
    pub module_key: String,
    pub version: Option<String>,
}

/// GET /api/v1/modules
pub async fn list_modules(
    State(state): State<AppState>,
    Query(filter): Query<ModuleFilter>,
) -> AppResult<impl IntoResponse> {
    let modules = state.engine.registry.list(&filter).await?;
    Ok(Json(DataResponse { data: modules }))
}

/// POST /api/v1/modules
///
/// Returns 201 with the stored definition, 409 if the key/version pair is
/// already registered.
pub async fn register_module(
    State(state): State<AppState>,
    Json(input): Json<RegisterModuleRequest>,
) -> AppResult<impl IntoResponse> {
    let created = state.engine.registry.register(input.into()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /api/v1/modules/resolve
///
/// The definition a new run would bind to right now.
pub async fn resolve_module(
    State(state): State<AppState>,
    Query(params): Query<ResolveQuery>,
) -> AppResult<impl IntoResponse> {
    let resolved = state
        .engine
        .resolver
        .resolve(&params.module_key, params.version.as_deref())
        .await?;
    Ok(Json(DataResponse { data: resolved }))
}

/// GET /api/v1/modules/{id}
pub async fn get_module(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let module = state.engine.registry.get(id).await?;
    Ok(Json(DataResponse { data: module }))
}

/// PATCH /api/v1/modules/{id}
///
/// Toggle `is_enabled` and/or replace `config_schema`. Key, version, type,
/// and scope are immutable.
pub async fn update_module(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(update): Json<ModuleUpdate>,
) -> AppResult<impl IntoResponse> {
    let updated = state.engine.registry.update(id, update).await?;
    Ok(Json(DataResponse { data: updated }))
}
