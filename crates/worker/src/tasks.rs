//! Shutdown helpers for the worker's background tasks.

use std::time::Duration;

use tokio::task::JoinHandle;

/// How a background task ended after shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    Stopped,
    Panicked,
    TimedOut,
}

/// Wait up to `grace` for `handle` to finish, logging anything but a clean stop.
pub async fn join_within(name: &str, handle: JoinHandle<()>, grace: Duration) -> TaskExit {
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(())) => {
            tracing::debug!(task = name, "Background task stopped");
            TaskExit::Stopped
        }
        Ok(Err(e)) => {
            tracing::error!(task = name, error = %e, "Background task panicked");
            TaskExit::Panicked
        }
        Err(_) => {
            tracing::warn!(
                task = name,
                grace_secs = grace.as_secs(),
                "Background task did not stop within the grace period",
            );
            TaskExit::TimedOut
        }
    }
}
