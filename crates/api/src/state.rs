use std::sync::Arc;

use leadgraph_core::engine::Engine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the config is behind `Arc` and the engine holds its
/// backends by `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Registry, resolver, ledger, and dispatch over the process's backends.
    pub engine: Engine,
}
