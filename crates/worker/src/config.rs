use std::time::Duration;

use leadgraph_core::config::{env_or, env_required, positive, ConfigError};

/// Orphan sweep settings. Disabled unless `RECONCILE_ENABLED=true`.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// A QUEUED run older than this is re-enqueued unless it has a pending
    /// job or a claim younger than this.
    pub orphan_age: Duration,
    pub batch_size: i64,
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Recorded on claimed jobs (default: `worker-<pid>`).
    pub worker_name: String,
    pub poll_interval: Duration,
    pub reconcile: ReconcileConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default        |
    /// |-----------------------------|----------------|
    /// | `DATABASE_URL`              | (required)     |
    /// | `WORKER_NAME`               | `worker-<pid>` |
    /// | `WORKER_POLL_INTERVAL_MS`   | `1000`         |
    /// | `RECONCILE_ENABLED`         | `false`        |
    /// | `RECONCILE_INTERVAL_SECS`   | `60`           |
    /// | `RECONCILE_ORPHAN_AGE_SECS` | `300`          |
    /// | `RECONCILE_BATCH_SIZE`      | `50`           |
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env_required("DATABASE_URL")?;
        let worker_name = std::env::var("WORKER_NAME")
            .unwrap_or_else(|_| format!("worker-{}", std::process::id()));

        let poll_ms = positive(
            "WORKER_POLL_INTERVAL_MS",
            env_or("WORKER_POLL_INTERVAL_MS", 1000u64)?,
        )?;

        let interval_secs = positive(
            "RECONCILE_INTERVAL_SECS",
            env_or("RECONCILE_INTERVAL_SECS", 60u64)?,
        )?;
        let orphan_age_secs = env_or("RECONCILE_ORPHAN_AGE_SECS", 300u64)?;
        let batch_size = positive(
            "RECONCILE_BATCH_SIZE",
            env_or("RECONCILE_BATCH_SIZE", 50u64)?,
        )?;

        Ok(Self {
            database_url,
            worker_name,
            poll_interval: Duration::from_millis(poll_ms),
            reconcile: ReconcileConfig {
                enabled: env_or("RECONCILE_ENABLED", false)?,
                interval: Duration::from_secs(interval_secs),
                orphan_age: Duration::from_secs(orphan_age_secs),
                batch_size: i64::try_from(batch_size).unwrap_or(i64::MAX),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn zero_poll_interval_is_rejected() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/leadgraph_test");
        std::env::set_var("WORKER_POLL_INTERVAL_MS", "0");
        let result = WorkerConfig::from_env();
        std::env::remove_var("WORKER_POLL_INTERVAL_MS");

        assert_matches!(
            result,
            Err(ConfigError::Invalid { var: "WORKER_POLL_INTERVAL_MS", .. })
        );
    }
}
