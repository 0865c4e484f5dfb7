//! Connection pool implementation

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use poolside_core::{ConnectionConfig, Connector, PoolsideError, RawConnection, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::config::PoolConfig;
use super::connection::PooledConnection;
use super::stats::PoolStats;
use crate::health;

/// A raw connection together with the identity it keeps across checkouts
pub(crate) struct Slot {
    pub(crate) id: Uuid,
    pub(crate) raw: Box<dyn RawConnection>,
}

/// An idle slot and the moment it was returned
struct IdleEntry {
    slot: Slot,
    returned_at: Instant,
}

/// Everything guarded by the pool mutex
struct PoolState {
    /// Live connections: idle, checked out, or reserved while connecting
    total: usize,
    /// Oldest return first; the prober relies on this ordering
    idle: VecDeque<IdleEntry>,
    closed: bool,
}

enum Checkout {
    Idle(Slot),
    Create,
    Exhausted,
    Closed,
}

/// State shared between the pool handles, its connections and the prober
pub(crate) struct PoolShared {
    config: PoolConfig,
    connection_config: ConnectionConfig,
    connector: Box<dyn Connector>,
    state: Mutex<PoolState>,
    /// Signalled whenever a connection or a slot becomes available
    available: Notify,
    shutdown: Arc<Notify>,
    prober: Mutex<Option<JoinHandle<()>>>,
}

impl PoolShared {
    fn try_checkout(&self) -> Checkout {
        let mut state = self.state.lock();
        if state.closed {
            return Checkout::Closed;
        }
        if let Some(entry) = state.idle.pop_front() {
            return Checkout::Idle(entry.slot);
        }
        if state.total < self.config.max_total() {
            state.total += 1;
            return Checkout::Create;
        }
        Checkout::Exhausted
    }

    /// Return a slot to the idle queue.
    ///
    /// Returns the slot back when it has to be destroyed instead: the pool is
    /// closed, or the idle queue already holds `min_idle` entries.
    pub(crate) fn checkin(&self, slot: Slot) -> Option<Slot> {
        let destroy = {
            let mut state = self.state.lock();
            if state.closed || state.idle.len() >= self.config.min_idle() {
                state.total -= 1;
                Some(slot)
            } else {
                state.idle.push_back(IdleEntry {
                    slot,
                    returned_at: Instant::now(),
                });
                None
            }
        };
        self.available.notify_waiters();
        destroy
    }

    /// Account for a connection that is being destroyed outside of `checkin`
    pub(crate) fn forget(&self) {
        {
            let mut state = self.state.lock();
            state.total -= 1;
        }
        self.available.notify_waiters();
    }

    /// When the oldest idle slot will have been idle for `max_idle`
    pub(crate) fn next_stale_at(&self, max_idle: Duration) -> Option<Instant> {
        self.state
            .lock()
            .idle
            .front()
            .map(|entry| entry.returned_at + max_idle)
    }

    /// Pop the oldest idle slot if it has been idle for at least `max_idle`
    pub(crate) fn pop_stale(&self, max_idle: Duration) -> Option<Slot> {
        let mut state = self.state.lock();
        match state.idle.front() {
            Some(entry) if entry.returned_at.elapsed() >= max_idle => {
                state.idle.pop_front().map(|entry| entry.slot)
            }
            _ => None,
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats::new(state.total, state.idle.len(), self.config.max_total())
    }
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        self.shutdown.notify_one();

        let state = self.state.get_mut();
        if state.closed || state.idle.is_empty() {
            return;
        }
        tracing::debug!(idle = state.idle.len(), "pool dropped without close, closing idle connections");
        state.total -= state.idle.len();
        for entry in state.idle.drain(..) {
            destroy_detached(entry.slot);
        }
    }
}

/// Gives a reserved slot back if connecting fails or the acquire is cancelled
struct Reservation<'a> {
    shared: &'a PoolShared,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.forget();
        }
    }
}

/// Close a raw connection, logging instead of failing
pub(crate) async fn destroy(slot: Slot) {
    if let Err(e) = slot.raw.close().await {
        tracing::warn!(connection_id = %slot.id, error = %e, "error closing connection");
    } else {
        tracing::debug!(connection_id = %slot.id, "connection closed");
    }
}

/// Close a raw connection from a synchronous context
pub(crate) fn destroy_detached(slot: Slot) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(destroy(slot));
        }
        Err(_) => {
            tracing::warn!(
                connection_id = %slot.id,
                "no async runtime available, dropping connection without closing it"
            );
        }
    }
}

/// A bounded pool of database connections
///
/// The pool creates connections on demand up to `max_total`, keeps at most
/// `min_idle` of them warm between uses, and optionally runs a background
/// prober that pings connections which sat idle for a full probe interval.
/// Handles are cheap to clone and share the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Create a new connection pool
    ///
    /// No connection is opened up front. When `keep_alive` is enabled the
    /// liveness prober is spawned on the current Tokio runtime.
    pub fn new<C: Connector>(
        config: PoolConfig,
        connection_config: ConnectionConfig,
        connector: C,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(PoolShared {
            config,
            connection_config,
            connector: Box::new(connector),
            state: Mutex::new(PoolState {
                total: 0,
                idle: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
            shutdown: Arc::new(Notify::new()),
            prober: Mutex::new(None),
        });

        if shared.config.keep_alive() {
            let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                PoolsideError::Configuration(format!(
                    "keep_alive requires a Tokio runtime: {}",
                    e
                ))
            })?;
            let handle = runtime.spawn(health::run_prober(
                Arc::downgrade(&shared),
                shared.shutdown.clone(),
                shared.config.probe_interval(),
            ));
            *shared.prober.lock() = Some(handle);
        }

        tracing::debug!(
            max_total = shared.config.max_total(),
            min_idle = shared.config.min_idle(),
            keep_alive = shared.config.keep_alive(),
            "connection pool created"
        );

        Ok(Self { shared })
    }

    /// Get a connection using the configured default acquire timeout
    pub async fn get(&self) -> Result<PooledConnection> {
        self.acquire(Some(self.shared.config.acquire_timeout()))
            .await
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Take the oldest idle connection, if any
    /// 2. Otherwise open a new connection while under `max_total`
    /// 3. Otherwise wait for a release until `timeout` elapses
    ///
    /// A `None` or zero timeout makes exactly one attempt without waiting.
    /// Returns `PoolExhausted` when nothing became available in time.
    pub async fn acquire(&self, timeout: Option<Duration>) -> Result<PooledConnection> {
        let deadline = timeout
            .filter(|t| !t.is_zero())
            .map(|t| Instant::now() + t);

        loop {
            // Register interest before looking so a release in between is not missed
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.shared.try_checkout() {
                Checkout::Idle(slot) => {
                    tracing::trace!(connection_id = %slot.id, "reusing idle connection");
                    return Ok(self.wrap(slot));
                }
                Checkout::Create => return self.create().await,
                Checkout::Closed => return Err(PoolsideError::PoolClosed),
                Checkout::Exhausted => {}
            }

            let Some(deadline) = deadline else {
                return Err(self.exhausted(timeout));
            };
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(self.exhausted(timeout));
            }
        }
    }

    /// Open a connection into a slot reserved by `try_checkout`
    async fn create(&self) -> Result<PooledConnection> {
        let mut reservation = Reservation {
            shared: &self.shared,
            armed: true,
        };

        let raw = self
            .shared
            .connector
            .connect(&self.shared.connection_config)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    host = %self.shared.connection_config.host,
                    port = self.shared.connection_config.port,
                    error = %e,
                    "failed to open connection"
                );
            })?;
        reservation.armed = false;

        let slot = Slot {
            id: Uuid::new_v4(),
            raw,
        };
        tracing::debug!(
            connection_id = %slot.id,
            driver = slot.raw.driver_name(),
            stats = ?self.stats(),
            "connection created"
        );
        Ok(self.wrap(slot))
    }

    fn wrap(&self, slot: Slot) -> PooledConnection {
        PooledConnection::new(slot, Arc::downgrade(&self.shared))
    }

    fn exhausted(&self, timeout: Option<Duration>) -> PoolsideError {
        let stats = self.stats();
        tracing::warn!(?timeout, total = stats.total(), "connection pool exhausted");
        PoolsideError::PoolExhausted(format!(
            "no connection available within {:?} (max_total = {}); consider raising max_total",
            timeout.unwrap_or_default(),
            stats.max_total()
        ))
    }

    /// Return a checked-out connection to the pool
    ///
    /// The connection is destroyed instead when `min_idle` connections are
    /// already idle.
    pub async fn release(&self, mut connection: PooledConnection) {
        connection.release().await;
    }

    /// Destroy a connection regardless of the idle target
    ///
    /// Returns `false` if the connection was already closed or returned.
    pub async fn drop_connection(&self, connection: &mut PooledConnection) -> bool {
        connection.discard().await
    }

    /// Destroy every idle connection and stop the prober
    ///
    /// Checked-out connections are destroyed as they come back. Closing an
    /// already closed pool is a no-op.
    pub async fn close(&self) {
        let drained: Vec<Slot> = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained: Vec<Slot> = state.idle.drain(..).map(|entry| entry.slot).collect();
            state.total -= drained.len();
            drained
        };

        self.shared.shutdown.notify_one();
        self.shared.available.notify_waiters();

        let prober = self.shared.prober.lock().take();
        if let Some(handle) = prober {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "liveness prober ended abnormally");
            }
        }

        let count = drained.len();
        for slot in drained {
            destroy(slot).await;
        }
        tracing::info!(closed_idle = count, stats = ?self.stats(), "connection pool closed");
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<PoolShared> {
        &self.shared
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}
