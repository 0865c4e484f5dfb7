//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a connection pool's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Live connections (idle + checked out)
    total: usize,
    /// Connections sitting in the idle queue
    idle: usize,
    /// Connections currently checked out
    active: usize,
    /// Configured upper bound on live connections
    max_total: usize,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(total: usize, idle: usize, max_total: usize) -> Self {
        Self {
            total,
            idle,
            active: total.saturating_sub(idle),
            max_total,
        }
    }

    /// Get the total number of live connections
    pub fn total(&self) -> usize {
        self.total
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of checked-out connections
    pub fn active(&self) -> usize {
        self.active
    }

    /// Get the configured maximum
    pub fn max_total(&self) -> usize {
        self.max_total
    }

    /// Share of live connections that are checked out (0.0 to 1.0)
    ///
    /// Returns 0.0 if total is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.active as f64 / self.total as f64
        }
    }

    /// Whether the next acquire would have to wait
    pub fn is_exhausted(&self) -> bool {
        self.idle == 0 && self.total >= self.max_total
    }
}
