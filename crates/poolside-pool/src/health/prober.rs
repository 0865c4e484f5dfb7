//! Background liveness prober for idle connections

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::ping::ping_connection;
use crate::pool::{PoolShared, destroy};

/// Outcome of one pass over the idle queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Connections that answered and went back to the pool
    pub alive: usize,
    /// Connections that failed the ping and were destroyed
    pub evicted: usize,
}

/// Probe loop spawned by the pool when keep_alive is enabled.
///
/// After each pass the loop sleeps until the oldest idle connection has
/// been idle for a full `interval`, or for one `interval` when nothing is
/// idle. Holds only a weak reference so it never keeps the pool alive; exits
/// on `shutdown` or once the pool is gone.
pub(crate) async fn run_prober(pool: Weak<PoolShared>, shutdown: Arc<Notify>, interval: Duration) {
    let mut wake_at = Instant::now() + interval;

    tracing::debug!(?interval, "liveness prober started");
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = tokio::time::sleep_until(wake_at) => {}
        }
        let Some(pool) = pool.upgrade() else {
            break;
        };
        let report = probe_idle(&pool, interval).await;
        if report.evicted > 0 {
            tracing::info!(
                alive = report.alive,
                evicted = report.evicted,
                "liveness probe evicted connections"
            );
        }

        let now = Instant::now();
        wake_at = pool
            .next_stale_at(interval)
            .map_or(now + interval, |at| at.max(now));
    }
    tracing::debug!("liveness prober stopped");
}

/// Ping every connection idle for at least `max_idle`, oldest first.
///
/// The idle queue is ordered by return time, so the pass stops at the first
/// entry younger than `max_idle`. The pool lock is only held to pop and push
/// entries, never across the ping itself.
pub(crate) async fn probe_idle(pool: &PoolShared, max_idle: Duration) -> ProbeReport {
    let stats = pool.stats();
    tracing::debug!(idle = stats.idle(), total = stats.total(), "probing idle connections");

    let mut report = ProbeReport::default();
    while let Some(slot) = pool.pop_stale(max_idle) {
        match ping_connection(slot.raw.as_ref()).await {
            Ok(latency) => {
                tracing::trace!(connection_id = %slot.id, ?latency, "idle connection alive");
                report.alive += 1;
                if let Some(slot) = pool.checkin(slot) {
                    destroy(slot).await;
                }
            }
            Err(e) => {
                tracing::warn!(connection_id = %slot.id, error = %e, "evicting dead idle connection");
                report.evicted += 1;
                pool.forget();
                destroy(slot).await;
            }
        }
    }
    report
}
