//! Route definitions for module runs.

use axum::routing::get;
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Run routes, mounted directly under `/api/v1`.
///
/// ```text
/// GET    /projects/{project_id}/runs                       -> list_project_runs
/// POST   /projects/{project_id}/runs                       -> create_project_run
/// GET    /projects/{project_id}/persons/{person_id}/runs   -> list_person_runs
/// POST   /projects/{project_id}/persons/{person_id}/runs   -> create_person_run
/// GET    /runs/{id}                                        -> get_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/runs",
            get(runs::list_project_runs).post(runs::create_project_run),
        )
        .route(
            "/projects/{project_id}/persons/{person_id}/runs",
            get(runs::list_person_runs).post(runs::create_person_run),
        )
        .route("/runs/{id}", get(runs::get_run))
}
