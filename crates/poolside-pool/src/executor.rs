//! Retry-once statement execution
//!
//! The executor acquires a connection, runs one statement and gives the
//! connection back. When the connection turns out to be broken it is
//! discarded and the statement is retried exactly once on a freshly acquired
//! connection.
//!
//! # Example
//!
//! ```ignore
//! use poolside_pool::RetryingExecutor;
//!
//! let executor = RetryingExecutor::new(pool.clone());
//! let result = executor.execute("SELECT id, name FROM users").await?;
//! ```

use poolside_core::{Result, ResultSet};

use crate::pool::ConnectionPool;


/// Executes statements against a pool, retrying once on broken connections
#[derive(Clone, Debug)]
pub struct RetryingExecutor {
    pool: ConnectionPool,
}

impl RetryingExecutor {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// The pool statements run against
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Execute a statement on a pooled connection.
    ///
    /// - transient connection error: discard the connection, retry once on a
    ///   new one
    /// - SQL error: release the still usable connection and return the error
    /// - any other failure, including a second transient error: discard the
    ///   connection and return the error
    pub async fn execute(&self, sql: &str) -> Result<ResultSet> {
        let mut conn = self.pool.get().await?;

        let first_attempt = conn.execute(sql).await;
        let outcome = match first_attempt {
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    connection_id = %conn.id(),
                    error = %err,
                    "execute failed on a broken connection, retrying once"
                );
                conn.discard().await;
                conn = self.pool.get().await?;
                conn.execute(sql).await
            }
            other => other,
        };

        match outcome {
            Ok(result) => {
                conn.release().await;
                Ok(result)
            }
            Err(err) if err.keeps_connection_usable() => {
                tracing::debug!(connection_id = %conn.id(), error = %err, "statement failed");
                conn.release().await;
                Err(err)
            }
            Err(err) => {
                tracing::error!(connection_id = %conn.id(), error = %err, "execute failed");
                conn.discard().await;
                Err(err)
            }
        }
    }
}
