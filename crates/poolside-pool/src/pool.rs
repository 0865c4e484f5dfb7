//! Connection pooling for database connections
//!
//! This module provides a bounded pool with an idle target, a timed acquire
//! and an optional background liveness prober.
//!
//! # Example
//!
//! ```ignore
//! use poolside_pool::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(1, 10)
//!     .with_acquire_timeout_ms(5000)
//!     .with_keep_alive(300);
//!
//! let pool = ConnectionPool::new(config, connection_config, connector)?;
//! let mut conn = pool.get().await?;
//! let result = conn.execute("SELECT 1").await?;
//! conn.release().await;
//! ```

mod config;
mod connection;
#[allow(clippy::module_inception)]
mod pool;
mod stats;


pub use config::PoolConfig;
pub use connection::PooledConnection;
pub use pool::ConnectionPool;
pub use stats::PoolStats;

pub(crate) use pool::{PoolShared, destroy};
