//! Opening MySQL connections for the pool

use async_trait::async_trait;
use mysql_async::{Conn, Opts, OptsBuilder};
use poolside_core::{ConnectionConfig, Connector, PoolsideError, RawConnection, Result};

use crate::connection::MySqlConnection;

/// Connector that opens one plain MySQL connection per call
///
/// The pool owns sizing and reuse, so no mysql_async pool is involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Build login options for `config`
pub(crate) fn build_opts(config: &ConnectionConfig) -> Result<Opts> {
    let charset = config.charset.as_str();
    if charset.is_empty() || !charset.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PoolsideError::Configuration(format!(
            "invalid character set: {:?}",
            charset
        )));
    }

    let builder = OptsBuilder::default()
        .ip_or_hostname(config.host.as_str())
        .tcp_port(config.port)
        .user(config.user.as_deref())
        .pass(config.password.as_deref())
        .db_name(config.database.as_deref())
        .init(vec![format!("SET NAMES {}", charset)]);
    Ok(builder.into())
}

/// Whether a failed connect attempt is worth one more try
///
/// Network and protocol-level failures are; server refusals such as bad
/// credentials or an unknown database are not.
pub(crate) fn is_retryable(err: &mysql_async::Error) -> bool {
    matches!(
        err,
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(_)
    )
}

fn connect_error(config: &ConnectionConfig, err: mysql_async::Error) -> PoolsideError {
    PoolsideError::Connect(format!(
        "failed to connect to MySQL at {}:{}: {}",
        config.host, config.port, err
    ))
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            database = ?config.database,
            "connecting to MySQL database"
        );

        let opts = build_opts(config)?;
        let conn = match Conn::new(opts.clone()).await {
            Ok(conn) => conn,
            Err(e) if is_retryable(&e) => {
                tracing::warn!(
                    host = %config.host,
                    port = config.port,
                    error = %e,
                    "MySQL connect failed, retrying once"
                );
                Conn::new(opts).await.map_err(|e| connect_error(config, e))?
            }
            Err(e) => return Err(connect_error(config, e)),
        };

        let connection = MySqlConnection::new(conn);
        tracing::debug!(
            connection_id = connection.connection_id(),
            "MySQL connection established"
        );
        Ok(Box::new(connection))
    }
}
