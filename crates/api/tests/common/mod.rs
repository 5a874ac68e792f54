#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use leadgraph_api::config::ServerConfig;
use leadgraph_api::router::build_app_router;
use leadgraph_api::state::AppState;
use leadgraph_core::engine::{Backends, Engine};
use leadgraph_core::memory::{MemoryDirectory, MemoryJobQueue};
use leadgraph_core::modules::{ModuleScope, ModuleType, NewModuleDefinition};
use leadgraph_core::runs::RunListLimits;

pub const PROJECT_ID: i64 = 1;
pub const OTHER_PROJECT_ID: i64 = 2;
pub const PERSON_ID: i64 = 7;
pub const OTHER_PERSON_ID: i64 = 8;
pub const FOREIGN_PERSON_ID: i64 = 9;
pub const USER_ID: i64 = 2;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        seed_modules_on_startup: false,
        run_list: RunListLimits::default(),
    }
}

/// Router plus handles onto its in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub engine: Engine,
    pub queue: Arc<MemoryJobQueue>,
}

/// Full application router over in-memory backends.
///
/// Directory: project 1 holds persons 7 and 8, project 2 holds person 9,
/// user 2 exists.
pub async fn build_test_app() -> TestApp {
    let directory = MemoryDirectory::default();
    directory.add_project(PROJECT_ID).await;
    directory.add_project(OTHER_PROJECT_ID).await;
    directory.add_person(PROJECT_ID, PERSON_ID).await;
    directory.add_person(PROJECT_ID, OTHER_PERSON_ID).await;
    directory.add_person(OTHER_PROJECT_ID, FOREIGN_PERSON_ID).await;
    directory.add_user(USER_ID).await;

    let queue = Arc::new(MemoryJobQueue::default());
    let backends = Backends {
        queue: queue.clone(),
        ..Backends::in_memory_with_directory(directory)
    };

    let config = test_config();
    let engine = Engine::new(backends, config.run_list);
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: engine.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        engine,
        queue,
    }
}

/// Register an enabled definition directly through the engine.
pub async fn register(
    app: &TestApp,
    key: &str,
    module_type: ModuleType,
    scope: ModuleScope,
    version: &str,
) {
    app.engine
        .registry
        .register(NewModuleDefinition {
            module_key: key.into(),
            module_type,
            scope,
            version: version.into(),
            config_schema: serde_json::json!({}),
            is_enabled: true,
        })
        .await
        .unwrap();
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body).await
}

pub async fn patch_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::PATCH, uri, body).await
}

async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
