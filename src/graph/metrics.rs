use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;
use parking_lot::Mutex;
use rusqlite::{CachedStatement, Connection};
use serde::Serialize;

/// Counter values at one point in time. `closure_layers` counts frontier queries issued
/// by closure searches; `checks_run` counts invariant checks evaluated for candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphMetricsSnapshot {
    pub prepare_count: u64,
    pub execute_count: u64,
    pub tx_begin_count: u64,
    pub tx_commit_count: u64,
    pub tx_rollback_count: u64,
    pub prepare_cache_hits: u64,
    pub prepare_cache_misses: u64,
    pub closure_layers: u64,
    pub checks_run: u64,
}

#[derive(Default)]
pub struct GraphMetrics {
    prepares: AtomicU64,
    executes: AtomicU64,
    tx_begin: AtomicU64,
    tx_commit: AtomicU64,
    tx_rollback: AtomicU64,
    prepare_cache_hits: AtomicU64,
    prepare_cache_misses: AtomicU64,
    closure_layers: AtomicU64,
    checks_run: AtomicU64,
}

impl GraphMetrics {
    pub fn snapshot(&self) -> GraphMetricsSnapshot {
        GraphMetricsSnapshot {
            prepare_count: self.prepares.load(Ordering::Relaxed),
            execute_count: self.executes.load(Ordering::Relaxed),
            tx_begin_count: self.tx_begin.load(Ordering::Relaxed),
            tx_commit_count: self.tx_commit.load(Ordering::Relaxed),
            tx_rollback_count: self.tx_rollback.load(Ordering::Relaxed),
            prepare_cache_hits: self.prepare_cache_hits.load(Ordering::Relaxed),
            prepare_cache_misses: self.prepare_cache_misses.load(Ordering::Relaxed),
            closure_layers: self.closure_layers.load(Ordering::Relaxed),
            checks_run: self.checks_run.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.prepares,
            &self.executes,
            &self.tx_begin,
            &self.tx_commit,
            &self.tx_rollback,
            &self.prepare_cache_hits,
            &self.prepare_cache_misses,
            &self.closure_layers,
            &self.checks_run,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_prepare(&self) {
        self.prepares.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execute(&self, sql: &str) {
        self.executes.fetch_add(1, Ordering::Relaxed);
        let keyword = sql.split_whitespace().next().unwrap_or_default();
        if keyword.eq_ignore_ascii_case("BEGIN") {
            self.tx_begin.fetch_add(1, Ordering::Relaxed);
        } else if keyword.eq_ignore_ascii_case("COMMIT") {
            self.tx_commit.fetch_add(1, Ordering::Relaxed);
        } else if keyword.eq_ignore_ascii_case("ROLLBACK") {
            self.tx_rollback.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_prepare_cache_hit(&self) {
        self.prepare_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prepare_cache_miss(&self) {
        self.prepare_cache_misses.fetch_add(1, Ordering::Relaxed);
        self.record_prepare();
    }

    pub fn record_closure_layer(&self) {
        self.closure_layers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_check(&self) {
        self.checks_run.fetch_add(1, Ordering::Relaxed);
    }
}

/// Remembers which statement texts have already gone through `prepare_cached`.
#[derive(Default)]
pub struct StatementTracker {
    seen: Mutex<AHashSet<String>>,
}

impl StatementTracker {
    fn observe(&self, sql: &str) -> bool {
        self.seen.lock().insert(sql.trim().to_string())
    }
}

#[derive(Copy, Clone)]
pub struct InstrumentedConnection<'a> {
    conn: &'a Connection,
    metrics: &'a GraphMetrics,
    tracker: &'a StatementTracker,
}

impl<'a> InstrumentedConnection<'a> {
    pub fn new(
        conn: &'a Connection,
        metrics: &'a GraphMetrics,
        tracker: &'a StatementTracker,
    ) -> Self {
        Self {
            conn,
            metrics,
            tracker,
        }
    }

    pub fn execute<P>(&self, sql: &str, params: P) -> Result<usize, rusqlite::Error>
    where
        P: rusqlite::Params,
    {
        self.metrics.record_execute(sql);
        self.conn.execute(sql, params)
    }

    pub fn prepare_cached<'b>(
        &'b self,
        sql: &str,
    ) -> Result<InstrumentedCachedStatement<'b>, rusqlite::Error> {
        if self.tracker.observe(sql) {
            self.metrics.record_prepare_cache_miss();
        } else {
            self.metrics.record_prepare_cache_hit();
        }
        Ok(InstrumentedCachedStatement {
            stmt: self.conn.prepare_cached(sql)?,
            metrics: self.metrics,
            sql: sql.to_string(),
        })
    }

    pub fn query_row<P, F, R>(&self, sql: &str, params: P, f: F) -> Result<R, rusqlite::Error>
    where
        P: rusqlite::Params,
        F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<R>,
    {
        self.metrics.record_prepare();
        self.metrics.record_execute(sql);
        self.conn.query_row(sql, params, f)
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }
}

pub struct InstrumentedCachedStatement<'conn> {
    stmt: CachedStatement<'conn>,
    metrics: &'conn GraphMetrics,
    sql: String,
}

impl InstrumentedCachedStatement<'_> {
    pub fn query_map<P, F, T>(
        &mut self,
        params: P,
        f: F,
    ) -> Result<rusqlite::MappedRows<'_, F>, rusqlite::Error>
    where
        P: rusqlite::Params,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        self.metrics.record_execute(self.sql.as_str());
        self.stmt.query_map(params, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_keywords_are_counted() {
        let metrics = GraphMetrics::default();
        metrics.record_execute("BEGIN IMMEDIATE");
        metrics.record_execute("  commit");
        metrics.record_execute("ROLLBACK");
        metrics.record_execute("SELECT 1");
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.execute_count, 4);
        assert_eq!(snapshot.tx_begin_count, 1);
        assert_eq!(snapshot.tx_commit_count, 1);
        assert_eq!(snapshot.tx_rollback_count, 1);
        assert_eq!(snapshot.closure_layers, 0);
        metrics.record_closure_layer();
        metrics.record_check();
        metrics.record_check();
        let snapshot = metrics.snapshot();
        assert_eq!((snapshot.closure_layers, snapshot.checks_run), (1, 2));
        metrics.reset();
        assert_eq!(metrics.snapshot(), GraphMetricsSnapshot::default());
    }

    #[test]
    fn test_prepare_cache_observations() {
        let conn = Connection::open_in_memory().expect("conn");
        let metrics = GraphMetrics::default();
        let tracker = StatementTracker::default();
        let instrumented = InstrumentedConnection::new(&conn, &metrics, &tracker);
        for _ in 0..3 {
            let mut stmt = instrumented.prepare_cached("SELECT 1").expect("prepare");
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0)).expect("rows");
            assert_eq!(rows.count(), 1);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.prepare_cache_misses, 1);
        assert_eq!(snapshot.prepare_cache_hits, 2);
        assert_eq!(snapshot.execute_count, 3);
    }
}
