use std::time::Duration;

use rusqlite::Connection;
use sqlitedag::{
    DagConfig, DagError, SqliteDag, open_dag,
    schema::{SCHEMA_VERSION, read_schema_version},
};
use tempfile::tempdir;

#[test]
fn test_data_persists_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("persist.db");
    let edge = {
        let dag = SqliteDag::open(&path).expect("dag");
        let a = dag.insert_vertex().expect("vertex");
        let b = dag.insert_vertex().expect("vertex");
        dag.create_edge(a, b).expect("edge")
    };
    let reopened = SqliteDag::open(&path).expect("reopen");
    assert_eq!(reopened.get_edge(edge.id).expect("edge"), edge);
    assert_eq!(reopened.vertex_count().expect("count"), 2);
    let err = reopened
        .create_edge(edge.target_id, edge.source_id)
        .expect_err("back loop after reopen");
    assert!(err.is_non_dag());
}

#[test]
fn test_schema_version_recorded() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("version.db");
    SqliteDag::open(&path).expect("dag");
    let conn = Connection::open(&path).expect("raw");
    assert_eq!(read_schema_version(&conn).expect("version"), SCHEMA_VERSION);
}

#[test]
fn test_newer_schema_version_is_refused() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("future.db");
    SqliteDag::open(&path).expect("dag");
    Connection::open(&path)
        .expect("raw")
        .execute(
            "UPDATE dag_meta SET schema_version = ?1 WHERE id = 1",
            [SCHEMA_VERSION + 1],
        )
        .expect("bump");
    let err = SqliteDag::open(&path).err().expect("newer schema");
    assert!(matches!(err, DagError::SchemaError(_)));
}

#[test]
fn test_config_pragmas_apply() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("wal.db");
    let cfg = DagConfig::new()
        .with_wal()
        .with_busy_timeout(Duration::from_millis(250));
    let dag = open_dag(&path, &cfg).expect("dag");
    dag.insert_vertex().expect("vertex");
    let mode: String = Connection::open(&path)
        .expect("raw")
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .expect("journal mode");
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn test_invalid_pragma_is_connection_error() {
    let mut cfg = DagConfig::new();
    cfg.sqlite
        .pragma_settings
        .insert("journal_mode".to_string(), "'; DROP".to_string());
    let err = sqlitedag::open_dag_in_memory(&cfg).err().expect("bad pragma");
    assert!(matches!(err, DagError::ConnectionError(_)));
}
