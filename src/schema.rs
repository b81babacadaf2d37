use rusqlite::{Connection, OptionalExtension};

use crate::errors::DagError;

pub const SCHEMA_VERSION: i64 = 1;

pub fn ensure_schema(conn: &Connection) -> Result<(), DagError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS dag_vertices (
            id INTEGER PRIMARY KEY AUTOINCREMENT
        );
        CREATE TABLE IF NOT EXISTS dag_edges (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL REFERENCES dag_vertices(id),
            target_id INTEGER NOT NULL REFERENCES dag_vertices(id),
            CHECK (source_id <> target_id)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_edges_pair ON dag_edges(source_id, target_id);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON dag_edges(target_id);
        CREATE TABLE IF NOT EXISTS dag_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| DagError::schema(e.to_string()))?;
    ensure_meta(conn)
}

pub fn read_schema_version(conn: &Connection) -> Result<i64, DagError> {
    conn.query_row(
        "SELECT schema_version FROM dag_meta WHERE id=1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| DagError::schema(e.to_string()))
}

fn ensure_meta(conn: &Connection) -> Result<(), DagError> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT schema_version FROM dag_meta WHERE id=1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| DagError::schema(e.to_string()))?;
    match version {
        Some(existing) if existing > SCHEMA_VERSION => Err(DagError::schema(format!(
            "database schema version {existing} is newer than supported {SCHEMA_VERSION}"
        ))),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT OR IGNORE INTO dag_meta(id, schema_version) VALUES(1, ?1)",
                [SCHEMA_VERSION],
            )
            .map_err(|e| DagError::schema(e.to_string()))?;
            Ok(())
        }
    }
}
