//! Handlers for module runs.
//!
//! Creation goes through the orchestrator: the run is committed first and
//! then dispatched, so a 503 `DISPATCH_FAILURE` still carries a `run_id`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use leadgraph_core::runs::RunFilter;
use leadgraph_core::types::DbId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for both run creation endpoints.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRunBody {
    pub triggered_by_user_id: DbId,
    pub module_key: String,
    /// Pin a version; omitted means the latest enabled one.
    pub version: Option<String>,
    #[serde(default = "empty_config")]
    pub input_config: serde_json::Value,
}

fn empty_config() -> serde_json::Value {
    serde_json::json!({})
}

impl CreateRunBody {
    fn checked(self) -> AppResult<Self> {
        if !self.input_config.is_object() {
            return Err(AppError::BadRequest(
                "input_config must be a JSON object".to_string(),
            ));
        }
        Ok(self)
    }
}

/// POST /api/v1/projects/{project_id}/runs
pub async fn create_project_run(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(body): Json<CreateRunBody>,
) -> AppResult<impl IntoResponse> {
    let body = body.checked()?;
    let run = state
        .engine
        .orchestrator
        .create_project_run(
            project_id,
            body.triggered_by_user_id,
            &body.module_key,
            body.version,
            body.input_config,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

/// POST /api/v1/projects/{project_id}/persons/{person_id}/runs
pub async fn create_person_run(
    State(state): State<AppState>,
    Path((project_id, person_id)): Path<(DbId, DbId)>,
    Json(body): Json<CreateRunBody>,
) -> AppResult<impl IntoResponse> {
    let body = body.checked()?;
    let run = state
        .engine
        .orchestrator
        .create_person_run(
            project_id,
            person_id,
            body.triggered_by_user_id,
            &body.module_key,
            body.version,
            body.input_config,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

/// GET /api/v1/projects/{project_id}/runs
///
/// All runs in the project, person-level ones included, newest first.
pub async fn list_project_runs(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(filter): Query<RunFilter>,
) -> AppResult<impl IntoResponse> {
    let runs = state.engine.ledger.list(project_id, None, &filter).await?;
    Ok(Json(DataResponse { data: runs }))
}

/// GET /api/v1/projects/{project_id}/persons/{person_id}/runs
pub async fn list_person_runs(
    State(state): State<AppState>,
    Path((project_id, person_id)): Path<(DbId, DbId)>,
    Query(filter): Query<RunFilter>,
) -> AppResult<impl IntoResponse> {
    let runs = state
        .engine
        .ledger
        .list(project_id, Some(person_id), &filter)
        .await?;
    Ok(Json(DataResponse { data: runs }))
}

/// GET /api/v1/runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = state.engine.ledger.get_by_id(run_id).await?;
    Ok(Json(DataResponse { data: run }))
}
