//! Route definitions for the `/modules` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::modules;
use crate::state::AppState;

/// Routes mounted at `/modules`.
///
/// ```text
/// GET    /                -> list_modules
/// POST   /                -> register_module
/// GET    /resolve         -> resolve_module
/// GET    /{id}            -> get_module
/// PATCH  /{id}            -> update_module
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(modules::list_modules).post(modules::register_module))
        .route("/resolve", get(modules::resolve_module))
        .route("/{id}", get(modules::get_module).patch(modules::update_module))
}
