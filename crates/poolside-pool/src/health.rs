//! Liveness checking for pooled connections
//!
//! This module provides the timed ping and the background prober that
//! keeps idle connections from going stale while they wait in the pool.
//!
//! # Example
//!
//! ```ignore
//! use poolside_pool::health::ping_connection;
//!
//! let latency = ping_connection(conn.raw()?).await?;
//! ```

mod ping;
mod prober;

#[cfg(test)]
mod tests;

pub use ping::{PingError, PingResult, ping_connection};
pub use prober::ProbeReport;

pub(crate) use prober::run_prober;
