//! Vertex and edge types and the SQLite store that persists them.

pub mod metrics;
mod store;
pub mod types;

pub use metrics::GraphMetricsSnapshot;
pub(crate) use store::{EdgeFilter, GraphStore, Table};
pub use types::{CandidateEdge, Direction, Edge, EdgeId, Vertex, VertexId};
