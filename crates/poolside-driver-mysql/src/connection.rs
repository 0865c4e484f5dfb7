//! MySQL connection implementation

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mysql_async::{Conn, Row as MySqlRow, consts::ColumnType, prelude::*};
use poolside_core::{PoolsideError, RawConnection, Result, ResultSet, Row};

use crate::value::from_mysql;

/// Map a driver error onto the pool's taxonomy.
///
/// I/O failures and a connection the driver already considers closed mean
/// the socket is gone; everything else is reported against the statement.
pub(crate) fn classify(err: mysql_async::Error, context: &str) -> PoolsideError {
    match err {
        mysql_async::Error::Io(e) => {
            PoolsideError::TransientConnection(format!("{}: {}", context, e))
        }
        mysql_async::Error::Driver(mysql_async::DriverError::ConnectionClosed) => {
            PoolsideError::TransientConnection(format!("{}: connection closed", context))
        }
        other => PoolsideError::SqlExecution(format!("{}: {}", context, other)),
    }
}

/// A single MySQL server connection
pub struct MySqlConnection {
    conn: tokio::sync::Mutex<Option<Conn>>,
    connection_id: u32,
    closed: AtomicBool,
}

impl MySqlConnection {
    pub(crate) fn new(conn: Conn) -> Self {
        Self {
            connection_id: conn.id(),
            conn: tokio::sync::Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
        }
    }

    /// Server-side thread id of this connection
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Run a statement that returns nothing
    async fn run(&self, sql: &str, context: &str) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed_error)?;
        conn.query_drop(sql)
            .await
            .map_err(|e| self.note_failure(classify(e, context)))
    }

    /// Mark the connection closed when the error says the socket is gone
    fn note_failure(&self, err: PoolsideError) -> PoolsideError {
        if err.is_transient() {
            self.closed.store(true, Ordering::SeqCst);
        }
        err
    }
}

fn closed_error() -> PoolsideError {
    PoolsideError::TransientConnection("MySQL connection is closed".into())
}

#[async_trait]
impl RawConnection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    #[tracing::instrument(skip(self, sql), fields(connection_id = self.connection_id, sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str) -> Result<ResultSet> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed_error)?;

        let mysql_rows: Vec<MySqlRow> = conn
            .query(sql)
            .await
            .map_err(|e| self.note_failure(classify(e, "failed to execute statement")))?;

        let affected_rows = conn.affected_rows();
        let last_insert_id = conn.last_insert_id().filter(|id| *id != 0);

        let mut column_names = Vec::new();
        let mut column_types = Vec::new();
        if let Some(first_row) = mysql_rows.first() {
            for col in first_row.columns_ref() {
                column_names.push(col.name_str().to_string());
                column_types.push(col.column_type());
            }
        }

        let mut rows = Vec::with_capacity(mysql_rows.len());
        for mysql_row in mysql_rows {
            let mut values = Vec::with_capacity(column_names.len());
            for idx in 0..column_names.len() {
                let mysql_val: mysql_async::Value =
                    mysql_row.get(idx).unwrap_or(mysql_async::Value::NULL);
                let col_type = column_types
                    .get(idx)
                    .copied()
                    .unwrap_or(ColumnType::MYSQL_TYPE_STRING);
                values.push(from_mysql(mysql_val, col_type));
            }
            rows.push(Row::new(column_names.clone(), values));
        }

        tracing::debug!(row_count = rows.len(), affected_rows, "statement executed");
        Ok(ResultSet {
            columns: column_names,
            rows,
            affected_rows,
            last_insert_id,
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed_error)?;
        conn.ping()
            .await
            .map_err(|e| self.note_failure(classify(e, "ping failed")))
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        let sql = if enabled {
            "SET autocommit = 1"
        } else {
            "SET autocommit = 0"
        };
        self.run(sql, "failed to set autocommit").await
    }

    async fn autocommit(&self) -> Result<bool> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(closed_error)?;
        let value: Option<i64> = conn
            .query_first("SELECT @@autocommit")
            .await
            .map_err(|e| self.note_failure(classify(e, "failed to read autocommit")))?;
        Ok(value.unwrap_or(1) != 0)
    }

    async fn begin(&self) -> Result<()> {
        self.run("START TRANSACTION", "failed to begin transaction")
            .await
    }

    async fn commit(&self) -> Result<()> {
        self.run("COMMIT", "failed to commit transaction").await
    }

    async fn rollback(&self) -> Result<()> {
        self.run("ROLLBACK", "failed to roll back transaction")
            .await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        tracing::debug!(connection_id = self.connection_id, "closing MySQL connection");
        conn.disconnect().await.map_err(|e| {
            PoolsideError::Connection(format!("failed to close MySQL connection: {}", e))
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("connection_id", &self.connection_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
