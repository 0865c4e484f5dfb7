//! Statement-level façade over the pool
//!
//! `Database` is what applications hold: a pool, a retrying executor and
//! thin adapters that shape a [`ResultSet`] into what each kind of
//! statement is usually asked for.

use poolside_core::{Connector, Result, ResultSet, Row};

use crate::config::DatabaseConfig;
use crate::executor::RetryingExecutor;
use crate::pool::{ConnectionPool, PoolStats};
use crate::transaction::Transaction;


/// A pooled database with CRUD helpers and transactions
#[derive(Clone, Debug)]
pub struct Database {
    executor: RetryingExecutor,
}

impl Database {
    /// Build the pool described by `config` on top of `connector`
    pub fn new<C: Connector>(config: DatabaseConfig, connector: C) -> Result<Self> {
        let pool = ConnectionPool::new(config.pool, config.connection, connector)?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: ConnectionPool) -> Self {
        Self {
            executor: RetryingExecutor::new(pool),
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        self.executor.pool()
    }

    /// Execute a statement, retrying once on a broken connection
    pub async fn execute(&self, sql: &str) -> Result<ResultSet> {
        self.executor.execute(sql).await
    }

    /// Run an INSERT and return the generated id, if any
    pub async fn insert(&self, sql: &str) -> Result<Option<u64>> {
        Ok(self.execute(sql).await?.last_insert_id)
    }

    /// Run an UPDATE and return the number of affected rows
    pub async fn update(&self, sql: &str) -> Result<u64> {
        let affected = self.execute(sql).await?.affected_rows;
        if affected == 0 {
            tracing::debug!(sql, "update matched no rows");
        }
        Ok(affected)
    }

    /// Run a DELETE and return the number of affected rows
    pub async fn delete(&self, sql: &str) -> Result<u64> {
        Ok(self.execute(sql).await?.affected_rows)
    }

    /// Run a query and return every row
    pub async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        Ok(self.execute(sql).await?.fetch_all())
    }

    /// Run a query and return its first row
    pub async fn query_one(&self, sql: &str) -> Result<Option<Row>> {
        Ok(self.execute(sql).await?.fetch_one())
    }

    /// Check out a connection and start a transaction on it
    pub async fn begin(&self) -> Result<Transaction> {
        let conn = self.pool().get().await?;
        let mut tx = Transaction::new(conn).await?;
        tx.begin().await?;
        Ok(tx)
    }

    pub async fn commit(&self, tx: &mut Transaction) -> Result<()> {
        tx.commit().await
    }

    pub async fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        tx.rollback().await
    }

    /// Run `body` in a transaction: commit on `Ok`, roll back on `Err`
    pub async fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Transaction) -> Result<T>,
    {
        let conn = self.pool().get().await?;
        Transaction::scope(conn, body).await
    }

    pub fn stats(&self) -> PoolStats {
        self.pool().stats()
    }

    /// Tear the pool down
    pub async fn close(&self) {
        self.pool().close().await;
    }
}
