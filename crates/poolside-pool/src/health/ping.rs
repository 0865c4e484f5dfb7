//! Connection ping
//!
//! Lightweight liveness check through the driver's native ping, timed so
//! the prober can log round-trip latency.

use std::time::{Duration, Instant};

use poolside_core::RawConnection;

/// Result of a ping operation
pub type PingResult = Result<Duration, PingError>;

/// Error that can occur during a ping operation
#[derive(Debug, Clone)]
pub enum PingError {
    /// The connection is closed
    ConnectionClosed,
    /// The driver reported a failed round-trip
    Failed(String),
}

impl std::fmt::Display for PingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PingError::ConnectionClosed => write!(f, "Connection is closed"),
            PingError::Failed(msg) => write!(f, "Ping failed: {}", msg),
        }
    }
}

impl std::error::Error for PingError {}

/// Ping a raw connection and return the round-trip time.
///
/// # Example
///
/// ```ignore
/// use poolside_pool::health::ping_connection;
///
/// let latency = ping_connection(conn.raw()?).await?;
/// println!("Database latency: {:?}", latency);
/// ```
pub async fn ping_connection(conn: &dyn RawConnection) -> PingResult {
    if conn.is_closed() {
        return Err(PingError::ConnectionClosed);
    }

    let start = Instant::now();
    match conn.ping().await {
        Ok(()) => Ok(start.elapsed()),
        Err(e) => Err(PingError::Failed(e.to_string())),
    }
}
