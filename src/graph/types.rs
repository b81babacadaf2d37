use serde::{Deserialize, Serialize};

pub type VertexId = i64;
pub type EdgeId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vertex {
    pub id: VertexId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: VertexId,
    pub target_id: VertexId,
}

/// Endpoints of an edge that has not been inserted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateEdge {
    pub source_id: VertexId,
    pub target_id: VertexId,
}

/// Traversal direction over the edge relation.
///
/// `Forward` matches edges on `source_id` and continues from `target_id`;
/// `Backward` matches on `target_id` and continues from `source_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Endpoint the expansion continues from.
    pub fn far_end(self, edge: &Edge) -> VertexId {
        match self {
            Direction::Forward => edge.target_id,
            Direction::Backward => edge.source_id,
        }
    }
}

pub fn row_to_vertex(row: &rusqlite::Row<'_>) -> Result<Vertex, rusqlite::Error> {
    Ok(Vertex { id: row.get(0)? })
}

pub fn row_to_edge(row: &rusqlite::Row<'_>) -> Result<Edge, rusqlite::Error> {
    Ok(Edge {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
    })
}
