use leadgraph_core::config::{env_or, ConfigError};
use leadgraph_core::runs::RunListLimits;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long post-shutdown cleanup may take (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Seed the built-in module catalog before serving (default: `true`).
    pub seed_modules_on_startup: bool,
    /// Page sizes for run listing.
    pub run_list: RunListLimits,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                    |
    /// | `SEED_MODULES_ON_STARTUP` | `true`                  |
    /// | `RUN_LIST_DEFAULT_LIMIT`  | `20`                    |
    /// | `RUN_LIST_MAX_LIMIT`      | `100`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_or("PORT", 3000u16)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = env_or("REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = env_or("SHUTDOWN_TIMEOUT_SECS", 30u64)?;
        let seed_modules_on_startup = env_or("SEED_MODULES_ON_STARTUP", true)?;

        let defaults = RunListLimits::default();
        let run_list = RunListLimits {
            default_limit: env_or("RUN_LIST_DEFAULT_LIMIT", defaults.default_limit)?,
            max_limit: env_or("RUN_LIST_MAX_LIMIT", defaults.max_limit)?,
        };
        if run_list.default_limit < 1 || run_list.max_limit < run_list.default_limit {
            return Err(ConfigError::Invalid {
                var: "RUN_LIST_DEFAULT_LIMIT",
                value: run_list.default_limit.to_string(),
                reason: format!(
                    "must be between 1 and RUN_LIST_MAX_LIMIT ({})",
                    run_list.max_limit
                ),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            seed_modules_on_startup,
            run_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_limit_above_max_is_rejected() {
        std::env::set_var("RUN_LIST_DEFAULT_LIMIT", "50");
        std::env::set_var("RUN_LIST_MAX_LIMIT", "10");
        let result = ServerConfig::from_env();
        std::env::remove_var("RUN_LIST_DEFAULT_LIMIT");
        std::env::remove_var("RUN_LIST_MAX_LIMIT");

        assert_matches!(
            result,
            Err(ConfigError::Invalid { var: "RUN_LIST_DEFAULT_LIMIT", .. })
        );
    }
}
