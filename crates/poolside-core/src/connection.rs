//! Raw connection capability and connector traits

use crate::{ConnectionConfig, Result, ResultSet};
use async_trait::async_trait;
use std::sync::Arc;

/// A single network connection to the database, as provided by a driver.
///
/// The pool never inspects SQL; it only forwards statements and drives the
/// transactional and liveness primitives below. Drivers must report broken
/// connections as [`crate::PoolsideError::TransientConnection`] and statement
/// failures as [`crate::PoolsideError::SqlExecution`].
#[async_trait]
pub trait RawConnection: Send + Sync {
    /// Get the driver name (e.g., "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement and return its result-set handle
    async fn execute(&self, sql: &str) -> Result<ResultSet>;

    /// Lightweight round-trip used by the liveness prober
    async fn ping(&self) -> Result<()>;

    /// Enable or disable autocommit
    async fn set_autocommit(&self, enabled: bool) -> Result<()>;

    /// Current autocommit setting
    async fn autocommit(&self) -> Result<bool>;

    /// Issue a native "start transaction"
    async fn begin(&self) -> Result<()>;

    /// Commit the current transaction
    async fn commit(&self) -> Result<()>;

    /// Roll back the current transaction
    async fn rollback(&self) -> Result<()>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Opens raw connections for the pool
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>>;
}

#[async_trait]
impl<T: Connector> Connector for Arc<T> {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>> {
        (**self).connect(config).await
    }
}
