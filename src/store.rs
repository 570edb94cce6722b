//! Store access: one "fetch all rows" capability.
//!
//! The collector calls [`Store::fetch_all`] on a blocking thread, so
//! implementations are plain synchronous code.

use crate::error::StoreError;
use crate::record::{AgvRecord, Snapshot};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

pub trait Store: Send + Sync + 'static {
    /// Read every AGV row.
    fn fetch_all(&self) -> Result<Snapshot, StoreError>;

    /// Startup reachability check.
    fn probe(&self) -> Result<(), StoreError> {
        self.fetch_all().map(|_| ())
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Column names, in the order [`SqliteStore`] selects them.
pub const COLUMNS: [&str; 13] = [
    "Communication.ID",
    "ID_AGV",
    "AGVEnable",
    "Communication.Status",
    "LayoutPosition.Route",
    "LayoutPosition.Point",
    "Traffic.ZoneA.Request",
    "Traffic.ZoneA.Busy",
    "Traffic.ZoneB.Request",
    "Traffic.ZoneB.Busy",
    "Battery.Percentage",
    "ScreenInfo",
    "TIME",
];

// ---------------------------------------------------------------------------
// Fixture store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FixtureState {
    rows: Vec<AgvRecord>,
    failure: Option<String>,
    delay: Duration,
}

/// Deterministic in-memory store.
///
/// Rows are set by the caller. When built with [`FixtureStore::from_file`] the
/// JSON file is re-read on every fetch, so editing it drives the pipeline.
#[derive(Debug, Default)]
pub struct FixtureStore {
    state: Mutex<FixtureState>,
    source: Option<PathBuf>,
    queries: AtomicUsize,
}

impl FixtureStore {
    pub fn new(rows: Vec<AgvRecord>) -> Self {
        Self {
            state: Mutex::new(FixtureState {
                rows,
                ..FixtureState::default()
            }),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Back the store with a JSON file holding an array of rows.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let rows = read_fixture(&path)?;
        Ok(Self {
            state: Mutex::new(FixtureState {
                rows,
                ..FixtureState::default()
            }),
            source: Some(path),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn set_rows(&self, rows: Vec<AgvRecord>) {
        self.lock().rows = rows;
    }

    /// Edit the current rows in place.
    pub fn update<F: FnOnce(&mut Vec<AgvRecord>)>(&self, f: F) {
        f(&mut self.lock().rows);
    }

    /// Make every fetch fail until [`FixtureStore::recover`] is called.
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.lock().failure = Some(reason.into());
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Block each fetch for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// Number of fetches started so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for FixtureStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let delay = self.lock().delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if let Some(path) = &self.source {
            let rows = read_fixture(path)?;
            self.lock().rows = rows;
        }

        let state = self.lock();
        if let Some(reason) = &state.failure {
            return Err(StoreError::Unavailable(reason.clone()));
        }
        Snapshot::new(state.rows.clone())
    }

    fn describe(&self) -> String {
        match &self.source {
            Some(path) => format!("fixture file {}", path.display()),
            None => "in-memory fixture".to_string(),
        }
    }
}

fn read_fixture(path: &Path) -> Result<Vec<AgvRecord>, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

/// Reads the AGV table from a SQLite database.
///
/// A read-only connection is opened for each fetch and dropped when the fetch
/// returns, on success and on error alike.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    table: String,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let table = table.into();
        if !is_valid_identifier(&table) {
            return Err(StoreError::Unavailable(format!("invalid table name {:?}", table)));
        }
        Ok(Self {
            path: path.into(),
            table,
            busy_timeout,
        })
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    fn select_sql(&self) -> String {
        let columns: Vec<String> = COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
        format!("SELECT {} FROM \"{}\"", columns.join(", "), self.table)
    }
}

impl Store for SqliteStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&self.select_sql())?;
        let rows = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(rows = rows.len(), table = %self.table, "Fetched AGV rows");
        Snapshot::new(rows)
    }

    fn probe(&self) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.prepare(&self.select_sql())?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite {} table {}", self.path.display(), self.table)
    }
}

pub(crate) fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AgvRecord> {
    Ok(AgvRecord {
        communication_id: row.get(0)?,
        agv_id: row.get(1)?,
        enable_raw: row.get(2)?,
        comm_status: row.get(3)?,
        route: blob(row, 4)?,
        point: blob(row, 5)?,
        zone_a_request: blob(row, 6)?,
        zone_a_busy: blob(row, 7)?,
        zone_b_request: blob(row, 8)?,
        zone_b_busy: blob(row, 9)?,
        battery_raw: blob(row, 10)?,
        screen_info_raw: blob(row, 11)?,
        timestamp: text(row, 12)?,
    })
}

// Non-blob values in a binary column are read as absent.
fn blob(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<u8>>> {
    match row.get::<_, Value>(idx)? {
        Value::Blob(bytes) => Ok(Some(bytes)),
        _ => Ok(None),
    }
}

fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get::<_, Value>(idx)? {
        Value::Text(s) => Some(s),
        Value::Integer(n) => Some(n.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        let timeout = Duration::from_millis(100);
        assert!(SqliteStore::new("x.db", "TestID", timeout).is_ok());
        assert!(SqliteStore::new("x.db", "agv_rows_2", timeout).is_ok());
        assert!(SqliteStore::new("x.db", "", timeout).is_err());
        assert!(SqliteStore::new("x.db", "t; DROP TABLE t", timeout).is_err());
        assert!(SqliteStore::new("x.db", "a\"b", timeout).is_err());
    }

    #[test]
    fn test_select_quotes_dotted_columns() {
        let store = SqliteStore::new("x.db", "TestID", Duration::from_millis(100)).expect("valid table");
        let sql = store.select_sql();
        assert!(sql.starts_with("SELECT \"Communication.ID\", \"ID_AGV\""));
        assert!(sql.ends_with("FROM \"TestID\""));
    }
}
