//! Poolside Core - Collaborator traits and shared types
//!
//! This crate provides what the pool and the drivers agree on:
//!
//! - `RawConnection` - Capability trait for one driver connection
//! - `Connector` - Trait for opening raw connections
//! - `PoolsideError` - The error taxonomy shared by pool, transactions and drivers
//! - `ConnectionConfig`, `Value`, `Row`, `ResultSet`

mod config;
mod connection;
mod error;
mod types;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use types::*;
