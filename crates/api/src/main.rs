use std::net::SocketAddr;
use std::sync::Arc;

use leadgraph_api::config::ServerConfig;
use leadgraph_api::router::build_app_router;
use leadgraph_api::state::AppState;
use leadgraph_core::catalog::default_catalog;
use leadgraph_core::config::env_required;
use leadgraph_core::engine::Engine;
use leadgraph_core::runtime::{init_tracing, shutdown_signal};
use leadgraph_core::seeding::seed_all;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing("leadgraph_api=debug,tower_http=debug");

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = env_required("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = leadgraph_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    leadgraph_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    leadgraph_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Orchestration core ---
    let engine = Engine::new(leadgraph_db::pg_backends(pool.clone()), config.run_list);

    if config.seed_modules_on_startup {
        let report = seed_all(&engine.registry, &default_catalog())
            .await
            .expect("Module catalog seeding failed");
        tracing::info!(
            seeded = report.seeded,
            skipped = report.skipped,
            "Module registry ready",
        );
    } else {
        tracing::info!("Module catalog seeding disabled");
    }

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, closing database pool");
    let closed = tokio::time::timeout(
        std::time::Duration::from_secs(config.shutdown_timeout_secs),
        pool.close(),
    )
    .await;
    if closed.is_err() {
        tracing::warn!("Database pool did not close within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}
