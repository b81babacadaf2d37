//! SQLite-backed directed acyclic graph with insert-time invariant checks.
//!
//! [`SqliteDag`] is the entry point. Edges are only admitted by
//! [`SqliteDag::create_edge`], which rejects self-loops, duplicate edges, two-vertex
//! back-loops and longer cycles inside one write transaction. Closure queries
//! (`ancestors_of`, `descendants_of`, `successors_of`, `predecessors_of`) expand the
//! graph one breadth-first layer per query.
//!
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod bench_utils;
pub mod cli;
mod closure;
pub mod config;
pub mod dag;
pub mod errors;
pub mod graph;
pub mod safety;
pub mod schema;
mod step;
mod validator;

pub use crate::config::{DagConfig, SqliteConfig, open_dag, open_dag_in_memory};
pub use crate::dag::SqliteDag;
pub use crate::errors::{DagError, Violation};
pub use crate::graph::{Direction, Edge, EdgeId, GraphMetricsSnapshot, Vertex, VertexId};
pub use crate::safety::{SafetyError, SafetyReport};
