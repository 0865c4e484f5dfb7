//! Transactions on a checked-out connection
//!
//! A [`Transaction`] owns its [`PooledConnection`] for its whole lifetime, so
//! the connection cannot be handed to anyone else while the transaction is
//! open. Ending the transaction, whether by commit or rollback, always
//! restores the connection's autocommit setting, clears its transaction tag
//! and releases it to the pool.
//!
//! # Example
//!
//! ```ignore
//! use poolside_pool::Transaction;
//!
//! let total = Transaction::scope(pool.get().await?, async |tx: &mut Transaction| {
//!     tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = 1").await?;
//!     tx.execute("UPDATE accounts SET balance = balance + 10 WHERE id = 2").await?;
//!     Ok(())
//! })
//! .await?;
//! ```

use poolside_core::{PoolsideError, Result, ResultSet, Row};
use uuid::Uuid;

use crate::pool::PooledConnection;


/// Lifecycle of a [`Transaction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    NotStarted,
    Active,
    Ended,
}

/// A transaction bound exclusively to one pooled connection
pub struct Transaction {
    id: Option<String>,
    state: TransactionState,
    saved_autocommit: bool,
    conn: PooledConnection,
}

impl Transaction {
    /// Wrap a checked-out connection, remembering its autocommit setting
    ///
    /// If reading the setting shows the connection is broken, the
    /// connection is discarded before the error is returned.
    pub async fn new(mut conn: PooledConnection) -> Result<Self> {
        let read = match conn.raw() {
            Ok(raw) => raw.autocommit().await,
            Err(e) => Err(e),
        };
        let saved_autocommit = match read {
            Ok(enabled) => enabled,
            Err(e) => {
                if e.is_transient() {
                    conn.discard().await;
                } else {
                    conn.release().await;
                }
                return Err(e);
            }
        };
        Ok(Self {
            id: None,
            state: TransactionState::NotStarted,
            saved_autocommit,
            conn,
        })
    }

    /// Run `body` inside a transaction on `conn`.
    ///
    /// Commits when `body` returns `Ok` and rolls back when it returns `Err`.
    /// The connection is released exactly once either way. If `body` ends
    /// the transaction itself, nothing further is issued.
    pub async fn scope<T, F>(conn: PooledConnection, body: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Transaction) -> Result<T>,
    {
        let mut tx = Transaction::new(conn).await?;
        tx.begin().await?;

        match body(&mut tx).await {
            Ok(value) => {
                if tx.is_active() {
                    tx.commit().await?;
                }
                Ok(value)
            }
            Err(err) => {
                if tx.is_active() {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::warn!(
                            transaction_id = ?tx.id,
                            error = %rollback_err,
                            "rollback after failed transaction body also failed"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Identifier assigned by `begin`
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// The connection the transaction runs on
    pub fn connection(&self) -> &PooledConnection {
        &self.conn
    }

    /// Start the transaction.
    ///
    /// Calling `begin` on an active transaction does nothing. If the driver
    /// refuses to start, the connection is finalized and released, or
    /// discarded when the failure says it is broken.
    pub async fn begin(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Active => return Ok(()),
            TransactionState::Ended => {
                return Err(PoolsideError::TransactionState(
                    "cannot begin a transaction that already ended".into(),
                ));
            }
            TransactionState::NotStarted => {}
        }

        let started = match self.conn.raw() {
            Ok(raw) => match raw.set_autocommit(false).await {
                Ok(()) => raw.begin().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            tracing::warn!(connection_id = %self.conn.id(), error = %e, "failed to start transaction");
            self.finish(e.is_transient()).await;
            return Err(e);
        }

        let id = Uuid::new_v4().to_string();
        self.conn.set_transaction_id(id.clone());
        tracing::debug!(transaction_id = %id, connection_id = %self.conn.id(), "transaction started");
        self.id = Some(id);
        self.state = TransactionState::Active;
        Ok(())
    }

    /// Commit the transaction.
    ///
    /// A failed commit is followed by a rollback before the commit error is
    /// returned. The connection is finalized and released in every case.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_active("commit")?;

        let mut broken = false;
        let result = match self.conn.raw() {
            Ok(raw) => match raw.commit().await {
                Ok(()) => Ok(()),
                Err(commit_err) => {
                    broken = commit_err.is_transient();
                    tracing::warn!(
                        transaction_id = ?self.id,
                        error = %commit_err,
                        "commit failed, rolling back"
                    );
                    if let Err(rollback_err) = raw.rollback().await {
                        broken |= rollback_err.is_transient();
                        tracing::error!(
                            transaction_id = ?self.id,
                            error = %rollback_err,
                            "rollback after failed commit also failed"
                        );
                    }
                    Err(commit_err)
                }
            },
            Err(e) => Err(e),
        };

        self.finish(broken).await;
        if result.is_ok() {
            tracing::debug!(transaction_id = ?self.id, "transaction committed");
        }
        result
    }

    /// Roll the transaction back; finalization runs whatever the outcome
    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_active("rollback")?;

        let result = match self.conn.raw() {
            Ok(raw) => raw.rollback().await,
            Err(e) => Err(e),
        };

        let broken = result.as_ref().is_err_and(|e| e.is_transient());
        self.finish(broken).await;
        tracing::debug!(transaction_id = ?self.id, ok = result.is_ok(), "transaction rolled back");
        result
    }

    /// Execute a statement on the transaction's connection
    pub async fn execute(&self, sql: &str) -> Result<ResultSet> {
        if self.state == TransactionState::Ended {
            return Err(PoolsideError::TransactionState(
                "cannot execute on a transaction that already ended".into(),
            ));
        }
        self.conn.execute(sql).await
    }

    /// Run an INSERT and return the generated id, if any
    pub async fn insert(&self, sql: &str) -> Result<Option<u64>> {
        Ok(self.execute(sql).await?.last_insert_id)
    }

    /// Run an UPDATE and return the number of affected rows
    pub async fn update(&self, sql: &str) -> Result<u64> {
        Ok(self.execute(sql).await?.affected_rows)
    }

    /// Run a DELETE and return the number of affected rows
    pub async fn delete(&self, sql: &str) -> Result<u64> {
        Ok(self.execute(sql).await?.affected_rows)
    }

    /// Execute a query and return every row
    pub async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        Ok(self.execute(sql).await?.fetch_all())
    }

    /// Execute a query and return its first row
    pub async fn query_one(&self, sql: &str) -> Result<Option<Row>> {
        Ok(self.execute(sql).await?.fetch_one())
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            state => Err(PoolsideError::TransactionState(format!(
                "cannot {} a transaction in state {:?}",
                operation, state
            ))),
        }
    }

    /// Restore autocommit, clear the tag and give the connection up.
    ///
    /// A `broken` connection skips the restore and is discarded rather than
    /// released, as is one whose restore fails with a connection error.
    async fn finish(&mut self, mut broken: bool) {
        self.state = TransactionState::Ended;

        if !broken {
            if let Ok(raw) = self.conn.raw() {
                if let Err(e) = raw.set_autocommit(self.saved_autocommit).await {
                    tracing::warn!(
                        connection_id = %self.conn.id(),
                        error = %e,
                        "failed to restore autocommit"
                    );
                    broken = e.is_transient();
                }
            }
        }
        self.conn.clear_transaction_id();
        if broken {
            self.conn.discard().await;
        } else {
            self.conn.release().await;
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        // The server still holds the transaction open, so the connection must
        // not go back to the idle queue.
        if self.state == TransactionState::Active {
            tracing::warn!(
                transaction_id = ?self.id,
                connection_id = %self.conn.id(),
                "transaction dropped while active, discarding its connection"
            );
            self.conn.discard_detached();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("connection", &self.conn)
            .finish()
    }
}
