//! Error types for poolside

use thiserror::Error;

/// Core error type for pool, transaction and driver operations
#[derive(Error, Debug)]
pub enum PoolsideError {
    /// Establishing a raw connection failed
    #[error("Connect error: {0}")]
    Connect(String),

    /// No connection became available before the acquire timeout
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),

    /// The connection broke mid-use (broken pipe, reset, server gone away)
    #[error("Transient connection error: {0}")]
    TransientConnection(String),

    /// The statement itself failed; the connection is still usable
    #[error("SQL execution error: {0}")]
    SqlExecution(String),

    /// Commit or rollback outside an active transaction
    #[error("Transaction state error: {0}")]
    TransactionState(String),

    /// A handle was used after it was released or discarded
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PoolsideError {
    /// Whether the error means the underlying connection can no longer be trusted.
    ///
    /// Transient errors are the only ones the retrying executor retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, PoolsideError::TransientConnection(_))
    }

    /// Whether the connection that produced this error may go back to the pool.
    pub fn keeps_connection_usable(&self) -> bool {
        matches!(self, PoolsideError::SqlExecution(_))
    }
}

/// Result type alias for poolside operations
pub type Result<T> = std::result::Result<T, PoolsideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(PoolsideError::TransientConnection("broken pipe".into()).is_transient());
        assert!(!PoolsideError::SqlExecution("syntax".into()).is_transient());
        assert!(!PoolsideError::Connect("refused".into()).is_transient());
        assert!(!PoolsideError::PoolExhausted("timeout".into()).is_transient());
    }

    #[test]
    fn test_sql_errors_keep_connection_usable() {
        assert!(PoolsideError::SqlExecution("duplicate key".into()).keeps_connection_usable());
        assert!(!PoolsideError::TransientConnection("reset".into()).keeps_connection_usable());
    }

    #[test]
    fn test_error_display() {
        let err = PoolsideError::PoolExhausted("no connection within 100ms".into());
        assert_eq!(err.to_string(), "Pool exhausted: no connection within 100ms");
        assert_eq!(PoolsideError::PoolClosed.to_string(), "Pool is closed");
    }
}
