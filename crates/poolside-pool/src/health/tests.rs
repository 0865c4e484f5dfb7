//! Tests for the health module

use super::prober::probe_idle;
use super::*;
use std::time::Duration;

use poolside_core::{ConnectionConfig, Connector};

use crate::mock::{MockConnector, init_tracing};
use crate::pool::{ConnectionPool, PoolConfig};

mod ping_tests {
    use super::*;

    #[test]
    fn test_ping_error_display() {
        let err = PingError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection is closed");

        let err = PingError::Failed("server has gone away".to_string());
        assert_eq!(err.to_string(), "Ping failed: server has gone away");
    }

    #[tokio::test]
    async fn test_ping_live_connection() {
        let connector = MockConnector::new();
        let raw = connector
            .connect(&ConnectionConfig::default())
            .await
            .expect("connect");

        assert!(ping_connection(raw.as_ref()).await.is_ok());
        assert_eq!(connector.connection(0).count("ping"), 1);
    }

    #[tokio::test]
    async fn test_ping_closed_connection() {
        let connector = MockConnector::new();
        let raw = connector
            .connect(&ConnectionConfig::default())
            .await
            .expect("connect");
        raw.close().await.expect("close");

        let err = ping_connection(raw.as_ref()).await.expect_err("closed");
        assert!(matches!(err, PingError::ConnectionClosed));
        // Closed connections are never sent a ping
        assert_eq!(connector.connection(0).count("ping"), 0);
    }

    #[tokio::test]
    async fn test_ping_failure() {
        let connector = MockConnector::new();
        let raw = connector
            .connect(&ConnectionConfig::default())
            .await
            .expect("connect");
        connector.connection(0).set_fail_ping(true);

        let err = ping_connection(raw.as_ref()).await.expect_err("ping fails");
        assert!(matches!(err, PingError::Failed(_)));
    }
}

mod prober_tests {
    use super::*;

    fn new_pool(config: PoolConfig, connector: &std::sync::Arc<MockConnector>) -> ConnectionPool {
        init_tracing();
        ConnectionPool::new(config, ConnectionConfig::default(), connector.clone())
            .expect("create pool")
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_skips_young_connections() {
        let connector = MockConnector::new();
        let pool = new_pool(PoolConfig::new(2, 2), &connector);

        let conn = pool.acquire(None).await.expect("acquire");
        pool.release(conn).await;

        let report = probe_idle(pool.shared(), Duration::from_secs(5)).await;
        assert_eq!(report, ProbeReport::default());
        assert_eq!(connector.connection(0).count("ping"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_stops_at_first_young_entry() {
        let connector = MockConnector::new();
        let pool = new_pool(PoolConfig::new(2, 2), &connector);

        let a = pool.acquire(None).await.expect("acquire a");
        let b = pool.acquire(None).await.expect("acquire b");
        let a_id = a.id();
        pool.release(a).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        pool.release(b).await;

        let report = probe_idle(pool.shared(), Duration::from_secs(5)).await;
        assert_eq!(report.alive, 1);
        assert_eq!(report.evicted, 0);
        assert_eq!(connector.connection(0).count("ping"), 1);
        assert_eq!(connector.connection(1).count("ping"), 0);

        // The probed connection went to the back of the queue
        let first = pool.acquire(None).await.expect("acquire");
        let second = pool.acquire(None).await.expect("acquire");
        assert_ne!(first.id(), a_id);
        assert_eq!(second.id(), a_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_evicts_dead_and_keeps_live_connections() {
        let connector = MockConnector::new();
        let pool = new_pool(PoolConfig::new(2, 3).with_keep_alive(5), &connector);

        let a = pool.acquire(None).await.expect("acquire a");
        let b = pool.acquire(None).await.expect("acquire b");
        let dead_id = a.id();
        pool.release(a).await;
        pool.release(b).await;
        assert_eq!(pool.stats().idle(), 2);

        connector.connection(0).set_fail_ping(true);
        tokio::time::sleep(Duration::from_secs(6)).await;

        let stats = pool.stats();
        assert_eq!(stats.total(), 1);
        assert_eq!(stats.idle(), 1);
        assert!(connector.connection(0).is_closed());
        assert!(!connector.connection(1).is_closed());
        assert_eq!(connector.connection(1).count("ping"), 1);

        let survivor = pool.acquire(None).await.expect("acquire");
        assert_ne!(survivor.id(), dead_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_follows_return_time_not_pool_start() {
        let connector = MockConnector::new();
        let pool = new_pool(PoolConfig::new(1, 1).with_keep_alive(5), &connector);

        let conn = pool.acquire(None).await.expect("acquire");
        tokio::time::sleep(Duration::from_secs(1)).await;
        pool.release(conn).await;
        connector.connection(0).set_fail_ping(true);

        // Idle for 4.5s: too young to probe, even though a pass ran at 5s
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(connector.connection(0).count("ping"), 0);
        assert_eq!(pool.stats().total(), 1);

        // Idle for 5.5s: probed once and evicted
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.connection(0).count("ping"), 1);
        assert!(connector.connection(0).is_closed());
        assert_eq!(pool.stats().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_waits_a_full_interval_when_nothing_is_idle() {
        let connector = MockConnector::new();
        let pool = new_pool(PoolConfig::new(1, 1).with_keep_alive(5), &connector);

        // Returned just after the first pass found the idle queue empty
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        let conn = pool.acquire(None).await.expect("acquire");
        pool.release(conn).await;
        connector.connection(0).set_fail_ping(true);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(connector.connection(0).count("ping"), 1);
        assert_eq!(pool.stats().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_leaves_checked_out_connections_alone() {
        let connector = MockConnector::new();
        let pool = new_pool(PoolConfig::new(1, 2).with_keep_alive(5), &connector);

        let held = pool.acquire(None).await.expect("acquire");
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(connector.connection(0).count("ping"), 0);
        assert!(held.is_checked_out());
        assert_eq!(pool.stats().total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_prober() {
        let connector = MockConnector::new();
        let pool = new_pool(PoolConfig::new(1, 2).with_keep_alive(5), &connector);

        let conn = pool.acquire(None).await.expect("acquire");
        pool.release(conn).await;

        // Returns only once the prober task has finished
        pool.close().await;
        assert!(connector.connection(0).is_closed());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.connection(0).count("ping"), 0);
    }
}
