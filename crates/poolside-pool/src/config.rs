//! Database configuration: connection target plus pool settings

use std::path::Path;

use poolside_core::{ConnectionConfig, Result};
use serde::{Deserialize, Serialize};

use crate::pool::PoolConfig;

/// Everything needed to stand up a [`crate::Database`]
///
/// Both halves are flattened so a single table carries
/// `{host, port, user, password, database, charset, maxTotal, minIdle,
/// keepAlive, probeIntervalSeconds, acquireTimeoutMs}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    #[serde(flatten)]
    pub pool: PoolConfig,
}

impl DatabaseConfig {
    /// Create a configuration from its two halves
    pub fn new(connection: ConnectionConfig, pool: PoolConfig) -> Self {
        Self { connection, pool }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.pool.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.pool.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file, picked by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading database configuration");
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }
}
