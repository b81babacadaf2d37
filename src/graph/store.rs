use std::path::Path;

use log::{debug, info, warn};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::{
    config::{DEFAULT_STATEMENT_CACHE, SqliteConfig},
    errors::{DagError, Violation},
    schema::ensure_schema,
};

use super::{
    metrics::{GraphMetrics, GraphMetricsSnapshot, InstrumentedConnection, StatementTracker},
    types::{Direction, Edge, EdgeId, Vertex, VertexId, row_to_edge, row_to_vertex},
};

const EDGES_BY_SOURCE_SQL: &str = "SELECT id, source_id, target_id FROM dag_edges \
     WHERE source_id IN (SELECT value FROM json_each(?1)) ORDER BY id";
const EDGES_BY_TARGET_SQL: &str = "SELECT id, source_id, target_id FROM dag_edges \
     WHERE target_id IN (SELECT value FROM json_each(?1)) ORDER BY id";
const EDGES_BY_PAIR_SQL: &str =
    "SELECT id, source_id, target_id FROM dag_edges WHERE source_id=?1 AND target_id=?2";
const VERTICES_BY_ID_SQL: &str =
    "SELECT id FROM dag_vertices WHERE id IN (SELECT value FROM json_each(?1)) ORDER BY id";

/// The two query shapes the traversal engines issue against the edge table.
#[derive(Clone, Copy, Debug)]
pub(crate) enum EdgeFilter<'a> {
    /// Equality on both endpoints.
    Pair {
        source_id: VertexId,
        target_id: VertexId,
    },
    /// Membership of the direction's matched endpoint in `ids`.
    Members {
        direction: Direction,
        ids: &'a [VertexId],
    },
}

/// SQLite-backed storage for vertices and edges. Performs no invariant checks beyond
/// what the schema enforces; callers go through [`crate::SqliteDag`].
pub(crate) struct GraphStore {
    conn: Connection,
    metrics: GraphMetrics,
    statement_tracker: StatementTracker,
}

impl GraphStore {
    pub(crate) fn open<P: AsRef<Path>>(path: P, cfg: &SqliteConfig) -> Result<Self, DagError> {
        info!("opening DAG store at {:?}", path.as_ref());
        let conn = Connection::open(path).map_err(|e| DagError::connection(e.to_string()))?;
        Self::from_connection(conn, cfg)
    }

    pub(crate) fn open_in_memory(cfg: &SqliteConfig) -> Result<Self, DagError> {
        let conn =
            Connection::open_in_memory().map_err(|e| DagError::connection(e.to_string()))?;
        Self::from_connection(conn, cfg)
    }

    pub(crate) fn metrics_snapshot(&self) -> GraphMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub(crate) fn metrics(&self) -> &GraphMetrics {
        &self.metrics
    }

    pub(crate) fn insert_vertex(&self) -> Result<VertexId, DagError> {
        let conn = self.connection();
        conn.execute("INSERT INTO dag_vertices DEFAULT VALUES", [])
            .map_err(|e| DagError::query(e.to_string()))?;
        let id = conn.last_insert_rowid();
        debug!("inserted vertex {id}");
        Ok(id)
    }

    pub(crate) fn get_vertex(&self, id: VertexId) -> Result<Vertex, DagError> {
        self.connection()
            .query_row(
                "SELECT id FROM dag_vertices WHERE id=?1",
                params![id],
                row_to_vertex,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => DagError::not_found(format!("vertex {id}")),
                other => DagError::query(other.to_string()),
            })
    }

    pub(crate) fn vertex_exists(&self, id: VertexId) -> Result<bool, DagError> {
        let exists: Option<i64> = self
            .connection()
            .query_row(
                "SELECT 1 FROM dag_vertices WHERE id=?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DagError::query(e.to_string()))?;
        Ok(exists.is_some())
    }

    /// Fetches the vertices among `ids` that exist, ordered by id.
    pub(crate) fn get_vertices(&self, ids: &[VertexId]) -> Result<Vec<Vertex>, DagError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = encode_ids(ids)?;
        let conn = self.connection();
        let mut stmt = conn
            .prepare_cached(VERTICES_BY_ID_SQL)
            .map_err(|e| DagError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![ids], row_to_vertex)
            .map_err(|e| DagError::query(e.to_string()))?;
        let mut vertices = Vec::new();
        for vertex in rows {
            vertices.push(vertex.map_err(|e| DagError::query(e.to_string()))?);
        }
        Ok(vertices)
    }

    pub(crate) fn vertex_ids(&self) -> Result<Vec<VertexId>, DagError> {
        let conn = self.connection();
        let mut stmt = conn
            .prepare_cached("SELECT id FROM dag_vertices ORDER BY id")
            .map_err(|e| DagError::query(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| DagError::query(e.to_string()))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id.map_err(|e| DagError::query(e.to_string()))?);
        }
        Ok(ids)
    }

    pub(crate) fn count(&self, table: Table) -> Result<i64, DagError> {
        let sql = match table {
            Table::Vertices => "SELECT COUNT(*) FROM dag_vertices",
            Table::Edges => "SELECT COUNT(*) FROM dag_edges",
        };
        self.connection()
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| DagError::query(e.to_string()))
    }

    /// Removes an unreferenced vertex. The reference check and the delete share one
    /// write transaction, so a concurrent edge insert cannot slip in between.
    pub(crate) fn delete_vertex(&self, id: VertexId) -> Result<(), DagError> {
        self.write_transaction(|store| store.delete_unreferenced_vertex(id))
    }

    fn delete_unreferenced_vertex(&self, id: VertexId) -> Result<(), DagError> {
        let referenced: Option<i64> = self
            .connection()
            .query_row(
                "SELECT 1 FROM dag_edges WHERE source_id=?1 OR target_id=?1 LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DagError::query(e.to_string()))?;
        if referenced.is_some() {
            return Err(DagError::vertex_in_use(format!(
                "vertex {id} is referenced by at least one edge"
            )));
        }
        let affected = self
            .connection()
            .execute("DELETE FROM dag_vertices WHERE id=?1", params![id])
            .map_err(|e| DagError::query(e.to_string()))?;
        if affected == 0 {
            return Err(DagError::not_found(format!("vertex {id}")));
        }
        debug!("deleted vertex {id}");
        Ok(())
    }

    pub(crate) fn delete_incident_edges(&self, id: VertexId) -> Result<usize, DagError> {
        let removed = self
            .connection()
            .execute(
                "DELETE FROM dag_edges WHERE source_id=?1 OR target_id=?1",
                params![id],
            )
            .map_err(|e| DagError::query(e.to_string()))?;
        debug!("deleted {removed} edges incident to vertex {id}");
        Ok(removed)
    }

    /// Inserts an edge row. Endpoints must exist; the pair index and the self-loop
    /// check constraint surface as the matching [`Violation`].
    pub(crate) fn insert_edge(
        &self,
        source_id: VertexId,
        target_id: VertexId,
    ) -> Result<EdgeId, DagError> {
        if !self.vertex_exists(source_id)? || !self.vertex_exists(target_id)? {
            return Err(DagError::invalid_input(
                "edge endpoints must reference existing vertices",
            ));
        }
        let conn = self.connection();
        conn.execute(
            "INSERT INTO dag_edges(source_id, target_id) VALUES(?1, ?2)",
            params![source_id, target_id],
        )
        .map_err(map_insert_error)?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn get_edge(&self, id: EdgeId) -> Result<Edge, DagError> {
        self.connection()
            .query_row(
                "SELECT id, source_id, target_id FROM dag_edges WHERE id=?1",
                params![id],
                row_to_edge,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => DagError::not_found(format!("edge {id}")),
                other => DagError::query(other.to_string()),
            })
    }

    pub(crate) fn delete_edge(&self, id: EdgeId) -> Result<(), DagError> {
        let affected = self
            .connection()
            .execute("DELETE FROM dag_edges WHERE id=?1", params![id])
            .map_err(|e| DagError::query(e.to_string()))?;
        if affected == 0 {
            return Err(DagError::not_found(format!("edge {id}")));
        }
        debug!("deleted edge {id}");
        Ok(())
    }

    pub(crate) fn all_edges(&self) -> Result<Vec<Edge>, DagError> {
        self.collect_edges(
            "SELECT id, source_id, target_id FROM dag_edges ORDER BY id",
            [],
        )
    }

    /// Returns every edge matching `filter`, ordered by edge id. One statement per call.
    pub(crate) fn query_edges(&self, filter: EdgeFilter<'_>) -> Result<Vec<Edge>, DagError> {
        match filter {
            EdgeFilter::Pair {
                source_id,
                target_id,
            } => self.collect_edges(EDGES_BY_PAIR_SQL, params![source_id, target_id]),
            EdgeFilter::Members { direction, ids } => {
                let sql = match direction {
                    Direction::Forward => EDGES_BY_SOURCE_SQL,
                    Direction::Backward => EDGES_BY_TARGET_SQL,
                };
                let ids = encode_ids(ids)?;
                self.collect_edges(sql, params![ids])
            }
        }
    }

    /// Runs `f` inside a deferred transaction so every read sees one snapshot.
    pub(crate) fn read_transaction<T, F>(&self, f: F) -> Result<T, DagError>
    where
        F: FnOnce(&Self) -> Result<T, DagError>,
    {
        self.transaction("BEGIN DEFERRED", f)
    }

    /// Runs `f` holding the database write lock from the first statement on, so a
    /// check-then-insert sequence cannot interleave with another writer.
    pub(crate) fn write_transaction<T, F>(&self, f: F) -> Result<T, DagError>
    where
        F: FnOnce(&Self) -> Result<T, DagError>,
    {
        self.transaction("BEGIN IMMEDIATE", f)
    }

    pub(crate) fn connection(&self) -> InstrumentedConnection<'_> {
        InstrumentedConnection::new(&self.conn, &self.metrics, &self.statement_tracker)
    }

    fn collect_edges<P>(&self, sql: &str, params: P) -> Result<Vec<Edge>, DagError>
    where
        P: rusqlite::Params,
    {
        let conn = self.connection();
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| DagError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params, row_to_edge)
            .map_err(|e| DagError::query(e.to_string()))?;
        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge.map_err(|e| DagError::query(e.to_string()))?);
        }
        Ok(edges)
    }

    fn transaction<T, F>(&self, begin: &str, f: F) -> Result<T, DagError>
    where
        F: FnOnce(&Self) -> Result<T, DagError>,
    {
        // Already inside an outer transaction: join it.
        if !self.conn.is_autocommit() {
            return f(self);
        }
        let conn = self.connection();
        conn.execute(begin, [])
            .map_err(|e| DagError::query(e.to_string()))?;
        let result = f(self).and_then(|value| {
            conn.execute("COMMIT", [])
                .map_err(|e| DagError::query(e.to_string()))?;
            Ok(value)
        });
        if result.is_err() && !self.conn.is_autocommit() {
            if let Err(err) = conn.execute("ROLLBACK", []) {
                warn!("rollback after failed transaction did not complete: {err}");
            }
        }
        result
    }

    fn from_connection(conn: Connection, cfg: &SqliteConfig) -> Result<Self, DagError> {
        conn.set_prepared_statement_cache_capacity(
            cfg.cache_size.unwrap_or(DEFAULT_STATEMENT_CACHE),
        );
        conn.busy_timeout(cfg.busy_timeout)
            .map_err(|e| DagError::connection(e.to_string()))?;
        let mut pragmas: Vec<_> = cfg.pragma_settings.iter().collect();
        pragmas.sort();
        for (key, value) in pragmas {
            let pragma_sql = format!("PRAGMA {key} = {value}");
            match conn.execute(&pragma_sql, []) {
                Ok(_) | Err(rusqlite::Error::ExecuteReturnedResults) => {}
                Err(e) => {
                    return Err(DagError::connection(format!("PRAGMA {key} = {value}: {e}")));
                }
            }
        }
        ensure_schema(&conn)?;
        Ok(Self {
            conn,
            metrics: GraphMetrics::default(),
            statement_tracker: StatementTracker::default(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Table {
    Vertices,
    Edges,
}

fn encode_ids(ids: &[VertexId]) -> Result<String, DagError> {
    serde_json::to_string(ids).map_err(|e| DagError::invalid_input(e.to_string()))
}

fn map_insert_error(err: rusqlite::Error) -> DagError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => Violation::MultiEdge.into(),
                rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => Violation::SelfLoop.into(),
                _ => DagError::invalid_input(err.to_string()),
            }
        }
        _ => DagError::query(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_vertices(count: usize) -> GraphStore {
        let store = GraphStore::open_in_memory(&SqliteConfig::default()).expect("store");
        for _ in 0..count {
            store.insert_vertex().expect("vertex");
        }
        store
    }

    #[test]
    fn test_insert_edge_maps_unique_violation() {
        let store = store_with_vertices(2);
        store.insert_edge(1, 2).expect("edge");
        let err = store.insert_edge(1, 2).expect_err("duplicate");
        assert_eq!(err.violation(), Some(Violation::MultiEdge));
    }

    #[test]
    fn test_insert_edge_maps_check_violation() {
        let store = store_with_vertices(1);
        let err = store.insert_edge(1, 1).expect_err("self loop");
        assert_eq!(err.violation(), Some(Violation::SelfLoop));
    }

    #[test]
    fn test_insert_edge_requires_existing_endpoints() {
        let store = store_with_vertices(1);
        let err = store.insert_edge(1, 9).expect_err("missing endpoint");
        assert!(matches!(err, DagError::InvalidInput(_)));
    }

    #[test]
    fn test_query_edges_by_membership() {
        let store = store_with_vertices(4);
        let a = store.insert_edge(1, 2).unwrap();
        let b = store.insert_edge(1, 3).unwrap();
        let c = store.insert_edge(3, 4).unwrap();
        let forward = store
            .query_edges(EdgeFilter::Members {
                direction: Direction::Forward,
                ids: &[1, 3],
            })
            .expect("forward");
        assert_eq!(forward.iter().map(|e| e.id).collect::<Vec<_>>(), vec![a, b, c]);
        let backward = store
            .query_edges(EdgeFilter::Members {
                direction: Direction::Backward,
                ids: &[4],
            })
            .expect("backward");
        assert_eq!(backward.iter().map(|e| e.id).collect::<Vec<_>>(), vec![c]);
        let empty = store
            .query_edges(EdgeFilter::Members {
                direction: Direction::Forward,
                ids: &[],
            })
            .expect("empty");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_query_edges_by_pair() {
        let store = store_with_vertices(2);
        let id = store.insert_edge(1, 2).unwrap();
        let found = store
            .query_edges(EdgeFilter::Pair {
                source_id: 1,
                target_id: 2,
            })
            .expect("pair");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        let reverse = store
            .query_edges(EdgeFilter::Pair {
                source_id: 2,
                target_id: 1,
            })
            .expect("reverse");
        assert!(reverse.is_empty());
    }

    #[test]
    fn test_write_transaction_rolls_back_on_error() {
        let store = store_with_vertices(2);
        let result: Result<(), DagError> = store.write_transaction(|store| {
            store.insert_edge(1, 2)?;
            Err(DagError::invalid_input("abort"))
        });
        assert!(result.is_err());
        assert_eq!(store.count(Table::Edges).unwrap(), 0);
        let snapshot = store.metrics_snapshot();
        assert_eq!(snapshot.tx_begin_count, 1);
        assert_eq!(snapshot.tx_rollback_count, 1);
        assert_eq!(snapshot.tx_commit_count, 0);
    }

    #[test]
    fn test_nested_transaction_joins_outer() {
        let store = store_with_vertices(2);
        store
            .write_transaction(|store| {
                store.read_transaction(|store| store.insert_edge(1, 2).map(|_| ()))
            })
            .expect("nested");
        assert_eq!(store.count(Table::Edges).unwrap(), 1);
        assert_eq!(store.metrics_snapshot().tx_begin_count, 1);
    }

    #[test]
    fn test_delete_vertex_refuses_referenced_vertex() {
        let store = store_with_vertices(2);
        store.insert_edge(1, 2).unwrap();
        let err = store.delete_vertex(2).expect_err("in use");
        assert!(matches!(err, DagError::VertexInUse(_)));
        assert_eq!(store.delete_incident_edges(2).unwrap(), 1);
        store.delete_vertex(2).expect("delete");
        assert!(!store.vertex_exists(2).unwrap());
    }

    #[test]
    fn test_delete_vertex_checks_and_deletes_in_one_transaction() {
        let store = store_with_vertices(2);
        store.insert_edge(1, 2).unwrap();
        store.reset_metrics();
        store.delete_vertex(1).expect_err("in use");
        let snapshot = store.metrics_snapshot();
        assert_eq!(snapshot.tx_begin_count, 1);
        assert_eq!(snapshot.tx_rollback_count, 1);
        assert!(store.conn.is_autocommit());
        store.delete_incident_edges(1).unwrap();
        store.reset_metrics();
        store.delete_vertex(1).expect("delete");
        let snapshot = store.metrics_snapshot();
        assert_eq!(snapshot.tx_begin_count, 1);
        assert_eq!(snapshot.tx_commit_count, 1);
        assert!(!store.vertex_exists(1).unwrap());
    }

    #[test]
    fn test_failed_transaction_keeps_original_error_and_connection_usable() {
        let store = store_with_vertices(2);
        let result: Result<(), DagError> = store.write_transaction(|store| {
            store.insert_edge(1, 2)?;
            // the body already closed the transaction; no second rollback is issued
            store.connection().execute("ROLLBACK", []).unwrap();
            Err(DagError::invalid_input("abort"))
        });
        assert!(matches!(result, Err(DagError::InvalidInput(_))));
        assert_eq!(store.metrics_snapshot().tx_rollback_count, 1);
        assert!(store.conn.is_autocommit());
        store.insert_edge(1, 2).expect("connection still usable");
    }
}
