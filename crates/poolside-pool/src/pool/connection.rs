//! Checked-out connection handle

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use poolside_core::{PoolsideError, RawConnection, Result, ResultSet};
use uuid::Uuid;

use super::pool::{PoolShared, Slot, destroy, destroy_detached};

/// A connection checked out of a [`super::ConnectionPool`]
///
/// The pool stays the owner of the underlying connection: the handle only
/// holds a weak back-reference and gives the connection back through
/// [`release`](Self::release) or destroys it through
/// [`discard`](Self::discard). A handle dropped while still checked out is
/// returned to the pool automatically, unless a statement was interrupted
/// on it, in which case it is destroyed.
pub struct PooledConnection {
    id: Uuid,
    slot: Option<Slot>,
    pool: Weak<PoolShared>,
    transaction_id: Option<String>,
    closed: bool,
    /// Set while a statement runs; still set if its future was dropped
    in_flight: AtomicBool,
}

impl PooledConnection {
    pub(crate) fn new(slot: Slot, pool: Weak<PoolShared>) -> Self {
        Self {
            id: slot.id,
            slot: Some(slot),
            pool,
            transaction_id: None,
            closed: false,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Identifier assigned when the connection was opened
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Transaction currently tagged on this connection
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn set_transaction_id(&mut self, transaction_id: impl Into<String>) {
        self.transaction_id = Some(transaction_id.into());
    }

    pub fn clear_transaction_id(&mut self) {
        self.transaction_id = None;
    }

    /// Whether the connection was destroyed through this handle
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether this handle still holds its connection
    pub fn is_checked_out(&self) -> bool {
        self.slot.is_some()
    }

    /// Borrow the driver connection
    pub fn raw(&self) -> Result<&dyn RawConnection> {
        match &self.slot {
            Some(slot) => Ok(slot.raw.as_ref()),
            None if self.closed => Err(PoolsideError::Connection(format!(
                "connection {} is closed",
                self.id
            ))),
            None => Err(PoolsideError::Connection(format!(
                "connection {} was already returned to the pool",
                self.id
            ))),
        }
    }

    /// Execute a statement and return its result-set handle
    pub async fn execute(&self, sql: &str) -> Result<ResultSet> {
        let raw = self.raw()?;
        tracing::trace!(
            connection_id = %self.id,
            transaction_id = ?self.transaction_id,
            sql,
            "executing statement"
        );
        self.in_flight.store(true, Ordering::SeqCst);
        let result = raw.execute(sql).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Whether a statement was cut off before it completed
    pub fn is_interrupted(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Give the connection back to the pool
    ///
    /// Releasing an already released or discarded handle does nothing. A
    /// connection whose last statement was interrupted is destroyed instead.
    pub async fn release(&mut self) {
        if self.is_interrupted() && self.slot.is_some() {
            tracing::warn!(connection_id = %self.id, "statement was interrupted, discarding connection");
            self.discard().await;
            return;
        }
        let Some(slot) = self.slot.take() else {
            return;
        };
        let to_destroy = match self.pool.upgrade() {
            Some(pool) => pool.checkin(slot),
            None => Some(slot),
        };
        if let Some(slot) = to_destroy {
            destroy(slot).await;
        }
    }

    /// Destroy the connection, bypassing the idle target
    ///
    /// Use this when the connection is known or suspected to be broken.
    /// Returns `false` when there was nothing left to close.
    pub async fn discard(&mut self) -> bool {
        match self.take_for_discard() {
            Some(slot) => {
                destroy(slot).await;
                true
            }
            None => false,
        }
    }

    /// Like [`discard`](Self::discard), closing the connection on a background task
    pub(crate) fn discard_detached(&mut self) -> bool {
        match self.take_for_discard() {
            Some(slot) => {
                destroy_detached(slot);
                true
            }
            None => false,
        }
    }

    fn take_for_discard(&mut self) -> Option<Slot> {
        let slot = self.slot.take()?;
        self.closed = true;
        if let Some(pool) = self.pool.upgrade() {
            pool.forget();
        }
        tracing::debug!(connection_id = %self.id, "discarding connection");
        Some(slot)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.is_interrupted() {
            if self.discard_detached() {
                tracing::warn!(connection_id = %self.id, "handle dropped mid-statement, connection discarded");
            }
            return;
        }
        if let Some(slot) = self.slot.take() {
            let to_destroy = match self.pool.upgrade() {
                Some(pool) => pool.checkin(slot),
                None => Some(slot),
            };
            if let Some(slot) = to_destroy {
                destroy_detached(slot);
            }
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("transaction_id", &self.transaction_id)
            .field("checked_out", &self.slot.is_some())
            .field("closed", &self.closed)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
