//! MySQL/MariaDB driver implementation

mod connection;
mod connector;
mod value;

pub use connection::MySqlConnection;
pub use connector::MySqlConnector;
