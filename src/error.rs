//! Error types for the monitor pipeline.
//!
//! Only [`ConfigError`] and a failed startup probe are ever fatal. Everything a
//! running poll loop can hit is a [`StoreError`], which is logged and dropped.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single store query.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the query
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The query did not complete within the poll timeout
    #[error("Store query timed out after {0:?}")]
    Timeout(Duration),

    /// Two rows in one result share a communication id
    #[error("Duplicate Communication.ID {0} in store result")]
    DuplicateCommunicationId(u32),

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error (fixture files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fixture file is not a valid snapshot
    #[error("Fixture parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// Fatal startup errors reported by the server binary.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Store is not reachable at startup: {0}")]
    StoreUnreachable(#[source] StoreError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A line on the viewer connection could not be understood.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Malformed event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected event {0:?}")]
    UnexpectedEvent(String),
}
