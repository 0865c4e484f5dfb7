//! In-memory driver used by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use poolside_core::{
    ConnectionConfig, Connector, PoolsideError, RawConnection, Result, ResultSet, Row, Value,
};

/// Observable state of one mock connection
pub(crate) struct MockState {
    pub(crate) serial: usize,
    closed: AtomicBool,
    autocommit: AtomicBool,
    broken: AtomicBool,
    fail_ping: AtomicBool,
    fail_commit: AtomicBool,
    execute_delay_ms: AtomicU64,
    calls: Mutex<Vec<String>>,
    live: Arc<AtomicUsize>,
}

impl MockState {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn autocommit(&self) -> bool {
        self.autocommit.load(Ordering::SeqCst)
    }

    pub(crate) fn set_fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Make every statement take `delay` before it answers
    pub(crate) fn set_execute_delay(&self, delay: Duration) {
        self.execute_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn check_usable(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PoolsideError::TransientConnection("connection closed".into()));
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(PoolsideError::TransientConnection("broken pipe".into()));
        }
        Ok(())
    }
}

pub(crate) struct MockConnection {
    state: Arc<MockState>,
}

#[async_trait]
impl RawConnection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str) -> Result<ResultSet> {
        self.state.record(format!("execute:{}", sql));
        let delay = self.state.execute_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.state.check_usable()?;

        let upper = sql.trim_start().to_ascii_uppercase();
        if upper.contains("SYNTAX ERROR") {
            return Err(PoolsideError::SqlExecution(format!(
                "You have an error in your SQL syntax near '{}'",
                sql
            )));
        }
        if upper.starts_with("SELECT") {
            if upper.contains("WHERE 1 = 0") {
                return Ok(ResultSet::with_rows(vec!["serial".into()], Vec::new()));
            }
            let columns = vec!["serial".to_string(), "n".to_string()];
            let rows = (1..=2)
                .map(|n| {
                    Row::new(
                        columns.clone(),
                        vec![Value::Int64(self.state.serial as i64), Value::Int64(n)],
                    )
                })
                .collect();
            return Ok(ResultSet::with_rows(columns, rows));
        }
        if upper.starts_with("INSERT") {
            return Ok(ResultSet::with_affected(1, Some(42)));
        }
        Ok(ResultSet::with_affected(3, None))
    }

    async fn ping(&self) -> Result<()> {
        self.state.record("ping");
        self.state.check_usable()?;
        if self.state.fail_ping.load(Ordering::SeqCst) {
            return Err(PoolsideError::TransientConnection("server has gone away".into()));
        }
        Ok(())
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        self.state.record(format!("set_autocommit:{}", enabled));
        self.state.check_usable()?;
        self.state.autocommit.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn autocommit(&self) -> Result<bool> {
        self.state.check_usable()?;
        Ok(self.state.autocommit())
    }

    async fn begin(&self) -> Result<()> {
        self.state.record("begin");
        self.state.check_usable()
    }

    async fn commit(&self) -> Result<()> {
        self.state.record("commit");
        self.state.check_usable()?;
        if self.state.fail_commit.load(Ordering::SeqCst) {
            return Err(PoolsideError::SqlExecution("deadlock found when trying to commit".into()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.state.record("rollback");
        self.state.check_usable()
    }

    async fn close(&self) -> Result<()> {
        self.state.record("close");
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            self.state.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

/// Connector that hands out mock connections and remembers each of them
pub(crate) struct MockConnector {
    connections: Mutex<Vec<Arc<MockState>>>,
    live: Arc<AtomicUsize>,
    peak: AtomicUsize,
    fail_connect: AtomicBool,
    broken_next: AtomicUsize,
    initial_autocommit: AtomicBool,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            broken_next: AtomicUsize::new(0),
            initial_autocommit: AtomicBool::new(true),
        })
    }

    /// Number of connections opened so far
    pub(crate) fn created(&self) -> usize {
        self.connections.lock().len()
    }

    /// Connections opened and not yet closed
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// State of the `serial`-th connection opened (0-based)
    pub(crate) fn connection(&self, serial: usize) -> Arc<MockState> {
        self.connections.lock()[serial].clone()
    }

    pub(crate) fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` connections fail every call as broken
    pub(crate) fn break_next(&self, count: usize) {
        self.broken_next.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_initial_autocommit(&self, enabled: bool) {
        self.initial_autocommit.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(PoolsideError::Connect(format!(
                "can't connect to server on '{}:{}'",
                config.host, config.port
            )));
        }

        let broken = self
            .broken_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let mut connections = self.connections.lock();
        let state = Arc::new(MockState {
            serial: connections.len(),
            closed: AtomicBool::new(false),
            autocommit: AtomicBool::new(self.initial_autocommit.load(Ordering::SeqCst)),
            broken: AtomicBool::new(broken),
            fail_ping: AtomicBool::new(false),
            fail_commit: AtomicBool::new(false),
            execute_delay_ms: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
            live: self.live.clone(),
        });
        connections.push(state.clone());

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockConnection { state }))
    }
}

/// Route test logs through the test harness; `RUST_LOG` picks the level
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
