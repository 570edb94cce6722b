//! Monitor configuration, loaded from TOML.
//!
//! Every section is optional. Missing values fall back to the defaults below.
//!
//! ```toml
//! [store]
//! kind = "sqlite"
//! path = "ams.db"
//! table = "TestID"
//!
//! [poll]
//! interval_ms = 3000
//! timeout_ms = 2000
//!
//! [server]
//! bind = "127.0.0.1:3001"
//!
//! [logging]
//! level = "info"
//!
//! [faults.19]
//! message = "Routing table: No next point"
//! severity = "warning"
//!
//! [locations]
//! 12 = "WINDSHIELD"
//! ```

use crate::classify::{Classifier, FaultEntry};
use crate::error::{ConfigError, StoreError};
use crate::store::{is_valid_identifier, FixtureStore, SqliteStore, Store};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
pub const DEFAULT_TABLE: &str = "TestID";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub store: StoreConfig,
    pub poll: PollConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Screen-info code (as a string key) to fault entry overrides
    pub faults: BTreeMap<String, FaultEntry>,
    /// Route number (as a string key) to location label overrides
    pub locations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    #[default]
    Fixture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// SQLite database file, or JSON fixture file
    pub path: Option<PathBuf>,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Fixture,
            path: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll.interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll.timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.store.kind == StoreKind::Sqlite && self.store.path.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "store.path",
                reason: "required for the sqlite store".to_string(),
            });
        }
        if !is_valid_identifier(&self.store.table) {
            return Err(ConfigError::InvalidValue {
                field: "store.table",
                reason: format!("{:?} is not a plain table name (letters, digits, '_')", self.store.table),
            });
        }
        self.classifier().map(|_| ())
    }

    /// Built-in tables with this config's overrides merged on top.
    pub fn classifier(&self) -> Result<Classifier, ConfigError> {
        let mut classifier = Classifier::builtin();

        let faults = self
            .faults
            .iter()
            .map(|(key, entry)| parse_code(key, "faults").map(|code| (code, entry.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        classifier.faults.merge(faults);

        let locations = self
            .locations
            .iter()
            .map(|(key, label)| parse_code(key, "locations").map(|route| (route, label.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        classifier.locations.merge(locations);

        Ok(classifier)
    }

    /// Build the configured store. Does not contact it.
    pub fn build_store(&self) -> Result<Arc<dyn Store>, StoreError> {
        match self.store.kind {
            StoreKind::Sqlite => {
                let path = self
                    .store
                    .path
                    .clone()
                    .ok_or_else(|| StoreError::Unavailable("no sqlite path configured".to_string()))?;
                Ok(Arc::new(SqliteStore::new(path, self.store.table.clone(), self.poll.timeout())?))
            }
            StoreKind::Fixture => match &self.store.path {
                Some(path) => Ok(Arc::new(FixtureStore::from_file(path)?)),
                None => Ok(Arc::new(FixtureStore::empty())),
            },
        }
    }
}

fn parse_code(key: &str, field: &'static str) -> Result<u16, ConfigError> {
    key.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
        field,
        reason: format!("key {:?} is not a number in 0-65535: {}", key, e),
    })
}
