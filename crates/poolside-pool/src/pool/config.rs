//! Pool configuration types

use std::time::Duration;

use poolside_core::{PoolsideError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pool sizing, the default acquire timeout and the keepalive prober.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Upper bound on simultaneously existing connections
    #[serde(alias = "maxConnections", alias = "max_total")]
    max_total: usize,
    /// Idle connections kept warm; returns beyond this are destroyed
    #[serde(alias = "minFreeConnections", alias = "min_idle")]
    min_idle: usize,
    /// Default timeout in milliseconds used by `ConnectionPool::get`
    #[serde(alias = "acquire_timeout_ms")]
    acquire_timeout_ms: u64,
    /// Whether the background liveness prober runs
    #[serde(alias = "keepConnectionAlive", alias = "keep_alive")]
    keep_alive: bool,
    /// Seconds an idle connection may sit before the prober pings it
    #[serde(alias = "probe_interval_seconds")]
    probe_interval_seconds: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given idle target and maximum size
    ///
    /// # Panics
    ///
    /// Panics if `min_idle > max_total` or if `max_total` is 0.
    pub fn new(min_idle: usize, max_total: usize) -> Self {
        assert!(
            max_total > 0,
            "max_total must be greater than 0, got {}",
            max_total
        );
        assert!(
            min_idle <= max_total,
            "min_idle ({}) cannot exceed max_total ({})",
            min_idle,
            max_total
        );

        Self {
            max_total,
            min_idle,
            acquire_timeout_ms: 15_000,
            keep_alive: false,
            probe_interval_seconds: 300,
        }
    }

    /// Set the default acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Enable the liveness prober with the given probe interval in seconds
    pub fn with_keep_alive(mut self, probe_interval_seconds: u64) -> Self {
        self.keep_alive = true;
        self.probe_interval_seconds = probe_interval_seconds;
        self
    }

    /// Check invariants that `new` asserts, for configurations that came
    /// from a file instead.
    pub fn validate(&self) -> Result<()> {
        if self.max_total == 0 {
            return Err(PoolsideError::Configuration(
                "max_total must be greater than 0".into(),
            ));
        }
        if self.min_idle > self.max_total {
            return Err(PoolsideError::Configuration(format!(
                "min_idle ({}) cannot exceed max_total ({})",
                self.min_idle, self.max_total
            )));
        }
        if self.keep_alive && self.probe_interval_seconds == 0 {
            return Err(PoolsideError::Configuration(
                "probe interval must be at least one second when keep_alive is set".into(),
            ));
        }
        Ok(())
    }

    /// Get the maximum number of live connections
    pub fn max_total(&self) -> usize {
        self.max_total
    }

    /// Get the idle target
    pub fn min_idle(&self) -> usize {
        self.min_idle
    }

    /// Get the default acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Whether the liveness prober is enabled
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Get the probe interval as a Duration
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds)
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_idle: 1
    /// - max_total: 10
    /// - acquire_timeout: 15 seconds
    /// - keep_alive: off, probing every 300 seconds when enabled
    fn default() -> Self {
        Self::new(1, 10)
    }
}
