//! Engine configuration
//!
//! A flat set of options; there is no dynamic reloading. The
//! connection strings are consumed by the hosting process when it
//! wires concrete `Store`/`JobQueue` implementations — the in-memory
//! reference implementations ignore them.

use std::time::Duration;

use serde::Deserialize;

/// Default bound on concurrently running cascade jobs.
pub const DEFAULT_MAX_WORKER_JOBS: usize = 10;

/// Default per-job timeout in seconds (5 minutes).
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_url: String,
    pub queue_url: String,
    pub max_worker_jobs: usize,
    pub job_timeout_secs: u64,
    pub debug_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/planward".into(),
            queue_url: "redis://localhost:6379/0".into(),
            max_worker_jobs: DEFAULT_MAX_WORKER_JOBS,
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            debug_logging: false,
        }
    }
}

impl EngineConfig {
    /// Read configuration from `PLANWARD_*` environment variables,
    /// falling back to the defaults for anything unset or malformed.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env_var("PLANWARD_DATABASE_URL").unwrap_or(defaults.database_url),
            queue_url: env_var("PLANWARD_QUEUE_URL").unwrap_or(defaults.queue_url),
            max_worker_jobs: env_var("PLANWARD_MAX_WORKER_JOBS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_worker_jobs),
            job_timeout_secs: env_var("PLANWARD_JOB_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.job_timeout_secs),
            debug_logging: env_var("PLANWARD_DEBUG_LOGGING")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.debug_logging),
        }
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
