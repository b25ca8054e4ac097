//! Job queue and worker pool configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::worker::WorkerPoolConfig;
use crate::domain::job::{BackoffPolicy, EnqueueOptions, DEFAULT_MAX_ATTEMPTS};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Concurrent jobs per instance
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry delays in seconds, comma-separated, capped at the last value
    #[serde(default = "default_backoff")]
    pub backoff_secs: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_promote_interval")]
    pub promote_interval_ms: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// A `processing` job older than this is presumed abandoned
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,
}

impl QueueConfig {
    pub fn backoff(&self) -> Result<BackoffPolicy, ValidationError> {
        let tiers = self
            .backoff_secs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>()
                    .map_err(|_| ValidationError::InvalidBackoff(format!("'{}' is not a number", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        BackoffPolicy::from_secs(&tiers).map_err(|e| ValidationError::InvalidBackoff(e.to_string()))
    }

    pub fn enqueue_options(&self) -> EnqueueOptions {
        EnqueueOptions::default().with_max_attempts(self.max_attempts)
    }

    pub fn worker_pool(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::default()
            .with_max_concurrent_jobs(self.workers)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_promote_interval(Duration::from_millis(self.promote_interval_ms))
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs))
            .with_lease_ttl(Duration::from_secs(self.lease_ttl_secs))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 || self.workers > 64 {
            return Err(ValidationError::InvalidWorkerCount);
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if self.poll_interval_ms == 0 || self.promote_interval_ms == 0 || self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        self.backoff()?;
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff(),
            poll_interval_ms: default_poll_interval(),
            promote_interval_ms: default_promote_interval(),
            sweep_interval_secs: default_sweep_interval(),
            lease_ttl_secs: default_lease_ttl(),
        }
    }
}

fn default_workers() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff() -> String {
    "1,5,15,60".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_promote_interval() -> u64 {
    1000
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_lease_ttl() -> u64 {
    300
}
