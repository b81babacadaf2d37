//! Configuration for opening a DAG store.
//!
//! Defaults match what [`SqliteDag::open`] and [`SqliteDag::open_in_memory`] use, so
//! callers only build a [`DagConfig`] when they need to tune SQLite itself.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::dag::SqliteDag;
use crate::errors::DagError;
use crate::graph::GraphStore;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STATEMENT_CACHE: usize = 128;

/// Options applied to the SQLite connection backing a [`SqliteDag`].
///
/// # Examples
///
/// ```rust
/// use sqlitedag::SqliteConfig;
///
/// let mut cfg = SqliteConfig::default();
/// cfg.pragma_settings.insert("journal_mode".to_string(), "WAL".to_string());
/// assert_eq!(cfg.busy_timeout, std::time::Duration::from_secs(5));
/// ```
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    /// Prepared statement cache capacity.
    ///
    /// **Default:** `None`, which keeps [`DEFAULT_STATEMENT_CACHE`].
    pub cache_size: Option<usize>,

    /// How long a writer waits for another connection's write transaction before
    /// `create_edge` gives up with a storage error.
    ///
    /// **Default:** [`DEFAULT_BUSY_TIMEOUT`]
    pub busy_timeout: Duration,

    /// Additional `PRAGMA key = value` settings applied right after opening, before the
    /// schema is checked.
    pub pragma_settings: HashMap<String, String>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            cache_size: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            pragma_settings: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DagConfig {
    pub sqlite: SqliteConfig,
}

impl DagConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for WAL journaling, which lets readers proceed while a writer holds
    /// the database.
    pub fn with_wal(mut self) -> Self {
        self.sqlite
            .pragma_settings
            .insert("journal_mode".to_string(), "WAL".to_string());
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.sqlite.busy_timeout = timeout;
        self
    }
}

pub fn open_dag<P: AsRef<Path>>(path: P, cfg: &DagConfig) -> Result<SqliteDag, DagError> {
    let store = GraphStore::open(path, &cfg.sqlite)?;
    Ok(SqliteDag::from_store(store))
}

pub fn open_dag_in_memory(cfg: &DagConfig) -> Result<SqliteDag, DagError> {
    let store = GraphStore::open_in_memory(&cfg.sqlite)?;
    Ok(SqliteDag::from_store(store))
}
