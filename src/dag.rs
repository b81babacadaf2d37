use std::path::Path;

use log::debug;

use crate::{
    closure,
    config::{DagConfig, open_dag, open_dag_in_memory},
    errors::DagError,
    graph::{
        CandidateEdge, Direction, Edge, EdgeId, GraphMetricsSnapshot, GraphStore, Table, Vertex,
        VertexId,
    },
    step, validator,
};

/// A persisted directed acyclic graph.
///
/// Every mutation that could break acyclicity goes through [`SqliteDag::create_edge`],
/// which validates and inserts inside one write transaction. Closure queries run inside
/// one read transaction, so each result reflects a single committed state.
///
/// Each handle owns one SQLite connection. Threads sharing a database file open one
/// handle each; concurrent `create_edge` calls are serialized by SQLite's write lock.
pub struct SqliteDag {
    store: GraphStore,
}

impl SqliteDag {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DagError> {
        open_dag(path, &DagConfig::default())
    }

    pub fn open_in_memory() -> Result<Self, DagError> {
        open_dag_in_memory(&DagConfig::default())
    }

    pub(crate) fn from_store(store: GraphStore) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn metrics_snapshot(&self) -> GraphMetricsSnapshot {
        self.store.metrics_snapshot()
    }

    pub fn reset_metrics(&self) {
        self.store.reset_metrics();
    }

    pub fn insert_vertex(&self) -> Result<VertexId, DagError> {
        self.store.insert_vertex()
    }

    pub fn get_vertex(&self, id: VertexId) -> Result<Vertex, DagError> {
        self.store.get_vertex(id)
    }

    pub fn vertex_ids(&self) -> Result<Vec<VertexId>, DagError> {
        self.store.vertex_ids()
    }

    pub fn vertex_count(&self) -> Result<i64, DagError> {
        self.store.count(Table::Vertices)
    }

    /// Deletes a vertex that no edge references; see [`SqliteDag::delete_vertex_cascade`]
    /// for removing a connected vertex.
    pub fn delete_vertex(&self, id: VertexId) -> Result<(), DagError> {
        self.store.delete_vertex(id)
    }

    /// Deletes the vertex together with every incident edge, atomically. Returns the
    /// number of edges removed.
    pub fn delete_vertex_cascade(&self, id: VertexId) -> Result<usize, DagError> {
        self.store.write_transaction(|store| {
            store.get_vertex(id)?;
            let removed = store.delete_incident_edges(id)?;
            store.delete_vertex(id)?;
            Ok(removed)
        })
    }

    /// Validates and inserts the edge `source_id -> target_id`.
    ///
    /// Rejections come back as [`DagError::NonDag`] carrying the first violated
    /// invariant, checked in order: self-loop, multi-edge, back-loop, cycle. Nothing is
    /// written unless the edge is admitted and committed.
    pub fn create_edge(&self, source_id: VertexId, target_id: VertexId) -> Result<Edge, DagError> {
        let candidate = CandidateEdge {
            source_id,
            target_id,
        };
        let edge = self.store.write_transaction(|store| {
            validator::validate(store, &candidate)?;
            let id = store.insert_edge(source_id, target_id)?;
            Ok(Edge {
                id,
                source_id,
                target_id,
            })
        })?;
        debug!("created edge {} ({source_id} -> {target_id})", edge.id);
        Ok(edge)
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge, DagError> {
        self.store.get_edge(id)
    }

    /// Removing an edge cannot introduce a violation, so no checks run.
    pub fn delete_edge(&self, id: EdgeId) -> Result<(), DagError> {
        self.store.delete_edge(id)
    }

    /// All edges, ordered by id.
    pub fn edges(&self) -> Result<Vec<Edge>, DagError> {
        self.store.all_edges()
    }

    pub fn edge_count(&self) -> Result<i64, DagError> {
        self.store.count(Table::Edges)
    }

    /// Edges ending where the given edge begins.
    pub fn previous_of(&self, edge_id: EdgeId) -> Result<Vec<Edge>, DagError> {
        self.store.read_transaction(|store| {
            let edge = store.get_edge(edge_id)?;
            step::previous(store, &edge)
        })
    }

    /// Edges starting where the given edge ends.
    pub fn next_of(&self, edge_id: EdgeId) -> Result<Vec<Edge>, DagError> {
        self.store.read_transaction(|store| {
            let edge = store.get_edge(edge_id)?;
            step::next(store, &edge)
        })
    }

    /// Every edge reachable forward from where the given edge ends.
    pub fn successors_of(&self, edge_id: EdgeId) -> Result<Vec<Edge>, DagError> {
        self.store.read_transaction(|store| {
            let edge = store.get_edge(edge_id)?;
            closure::successors(store, &edge)
        })
    }

    /// Every edge reachable backward from where the given edge begins.
    pub fn predecessors_of(&self, edge_id: EdgeId) -> Result<Vec<Edge>, DagError> {
        self.store.read_transaction(|store| {
            let edge = store.get_edge(edge_id)?;
            closure::predecessors(store, &edge)
        })
    }

    /// Vertices reachable from `vertex_id` in `direction`, excluding the vertex itself.
    pub fn family(&self, vertex_id: VertexId, direction: Direction) -> Result<Vec<Vertex>, DagError> {
        self.store.read_transaction(|store| {
            store.get_vertex(vertex_id)?;
            closure::family(store, vertex_id, direction)
        })
    }

    pub fn descendants_of(&self, vertex_id: VertexId) -> Result<Vec<Vertex>, DagError> {
        self.family(vertex_id, Direction::Forward)
    }

    pub fn ancestors_of(&self, vertex_id: VertexId) -> Result<Vec<Vertex>, DagError> {
        self.family(vertex_id, Direction::Backward)
    }

    pub fn incoming_edges(&self, vertex_id: VertexId) -> Result<Vec<Edge>, DagError> {
        self.adjacent_edges(vertex_id, Direction::Backward)
    }

    pub fn outgoing_edges(&self, vertex_id: VertexId) -> Result<Vec<Edge>, DagError> {
        self.adjacent_edges(vertex_id, Direction::Forward)
    }

    /// Direct predecessors of `vertex_id`.
    pub fn parents_of(&self, vertex_id: VertexId) -> Result<Vec<Vertex>, DagError> {
        self.neighbors(vertex_id, Direction::Backward)
    }

    /// Direct successors of `vertex_id`.
    pub fn children_of(&self, vertex_id: VertexId) -> Result<Vec<Vertex>, DagError> {
        self.neighbors(vertex_id, Direction::Forward)
    }

    fn adjacent_edges(
        &self,
        vertex_id: VertexId,
        direction: Direction,
    ) -> Result<Vec<Edge>, DagError> {
        self.store.read_transaction(|store| {
            store.get_vertex(vertex_id)?;
            step::step(store, direction, &[vertex_id])
        })
    }

    fn neighbors(&self, vertex_id: VertexId, direction: Direction) -> Result<Vec<Vertex>, DagError> {
        self.store.read_transaction(|store| {
            store.get_vertex(vertex_id)?;
            let mut ids: Vec<VertexId> = step::step(store, direction, &[vertex_id])?
                .iter()
                .map(|edge| direction.far_end(edge))
                .collect();
            ids.sort_unstable();
            ids.dedup();
            store.get_vertices(&ids)
        })
    }
}
