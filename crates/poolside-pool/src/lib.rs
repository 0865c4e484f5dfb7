//! Poolside Pool - Bounded connection pooling, transactions and retries
//!
//! This crate handles the connection lifecycle on top of a `poolside-core`
//! driver: checkout and return, background liveness probing, transactions
//! bound to a checked-out connection, and retry-once statement execution.

mod config;
mod database;
pub mod executor;
pub mod health;
pub mod pool;
pub mod transaction;

#[cfg(test)]
mod mock;

pub use config::DatabaseConfig;
pub use database::Database;
pub use executor::RetryingExecutor;
pub use health::{PingError, PingResult, ProbeReport, ping_connection};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use transaction::{Transaction, TransactionState};
