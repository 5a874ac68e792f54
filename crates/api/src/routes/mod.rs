pub mod health;
pub mod modules;
pub mod runs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /modules                                         list, register
/// /modules/resolve                                 resolve key (+ version)
/// /modules/{id}                                    get, update
///
/// /projects/{project_id}/runs                      list, create (project-level)
/// /projects/{project_id}/persons/{person_id}/runs  list, create (person-level)
/// /runs/{id}                                       get
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/modules", modules::router())
        .merge(runs::router())
}
