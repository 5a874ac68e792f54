use std::time::Duration;

use tokio_util::sync::CancellationToken;

use leadgraph_core::engine::Engine;
use leadgraph_core::runs::RunListLimits;
use leadgraph_core::runtime::{init_tracing, shutdown_signal};
use leadgraph_worker::config::WorkerConfig;
use leadgraph_worker::consumer::JobConsumer;
use leadgraph_worker::executor::ExecutorRegistry;
use leadgraph_worker::reconciler::OrphanReconciler;
use leadgraph_worker::tasks::join_within;

/// How long in-flight work may take to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing("leadgraph_worker=debug");

    let config = WorkerConfig::from_env().expect("Invalid worker configuration");
    tracing::info!(
        worker = %config.worker_name,
        reconcile = config.reconcile.enabled,
        "Loaded worker configuration",
    );

    let pool = leadgraph_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    leadgraph_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    let backends = leadgraph_db::pg_backends(pool.clone());
    let queue = backends.queue.clone();
    let engine = Engine::new(backends, RunListLimits::default());

    // Module logic is linked in by the deployment; an empty registry fails
    // every run with an explanatory message.
    let executors = ExecutorRegistry::new();
    if executors.is_empty() {
        tracing::warn!("No module executors registered; claimed runs will be marked FAILED");
    }

    let cancel = CancellationToken::new();

    let consumer = JobConsumer::new(queue, engine.ledger.clone(), executors, &config.worker_name)
        .with_poll_interval(config.poll_interval);
    let consumer_cancel = cancel.clone();
    let consumer_handle = tokio::spawn(async move {
        consumer.run(consumer_cancel).await;
    });

    let reconciler_handle = if config.reconcile.enabled {
        let reconciler = OrphanReconciler::new(
            engine.ledger.clone(),
            engine.gateway.clone(),
            &config.reconcile,
        );
        let reconciler_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            reconciler.run(reconciler_cancel).await;
        }))
    } else {
        tracing::info!("Orphan reconciler disabled");
        None
    };

    shutdown_signal().await;
    cancel.cancel();

    join_within("Job consumer", consumer_handle, SHUTDOWN_GRACE).await;
    if let Some(handle) = reconciler_handle {
        join_within("Orphan reconciler", handle, SHUTDOWN_GRACE).await;
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}
