//! Transitive closure over [`crate::step`], expanded one breadth-first layer at a time.
//!
//! Each layer issues a single membership query for the whole frontier, so the number of
//! store round trips follows the depth of the graph rather than its size.

use ahash::AHashSet;
use log::trace;

use crate::{
    errors::DagError,
    graph::{Direction, Edge, GraphStore, Vertex, VertexId},
    step::step,
};

/// Every edge reachable from `start_ids` in `direction`.
///
/// Once a layer discovers no new vertex, one final query over the complete visited set
/// collects all edges touching the closure.
pub(crate) fn search(
    store: &GraphStore,
    direction: Direction,
    start_ids: &[VertexId],
) -> Result<Vec<Edge>, DagError> {
    let mut visited: AHashSet<VertexId> = start_ids.iter().copied().collect();
    let mut frontier = sorted(visited.iter().copied());
    let mut layer = 0usize;
    loop {
        let edges = step(store, direction, &frontier)?;
        store.metrics().record_closure_layer();
        let discovered = sorted(
            edges
                .iter()
                .map(|edge| direction.far_end(edge))
                .filter(|id| !visited.contains(id)),
        );
        trace!(
            "{direction:?} layer {layer}: frontier={} edges={} new={}",
            frontier.len(),
            edges.len(),
            discovered.len()
        );
        if discovered.is_empty() {
            let all = sorted(visited);
            return step(store, direction, &all);
        }
        visited.extend(discovered.iter().copied());
        frontier = discovered;
        layer += 1;
    }
}

/// Edges after `edge`: everything reachable forward from its target.
pub(crate) fn successors(store: &GraphStore, edge: &Edge) -> Result<Vec<Edge>, DagError> {
    search(store, Direction::Forward, &[edge.target_id])
}

/// Edges before `edge`: everything reachable backward from its source.
pub(crate) fn predecessors(store: &GraphStore, edge: &Edge) -> Result<Vec<Edge>, DagError> {
    search(store, Direction::Backward, &[edge.source_id])
}

/// Ids of all vertices reachable from `vertex_id` in `direction`, excluding itself,
/// in ascending order.
pub(crate) fn family_ids(
    store: &GraphStore,
    vertex_id: VertexId,
    direction: Direction,
) -> Result<Vec<VertexId>, DagError> {
    let edges = search(store, direction, &[vertex_id])?;
    Ok(sorted(
        edges
            .iter()
            .flat_map(|edge| [edge.source_id, edge.target_id])
            .filter(|id| *id != vertex_id),
    ))
}

pub(crate) fn family(
    store: &GraphStore,
    vertex_id: VertexId,
    direction: Direction,
) -> Result<Vec<Vertex>, DagError> {
    let ids = family_ids(store, vertex_id, direction)?;
    store.get_vertices(&ids)
}

fn sorted(ids: impl IntoIterator<Item = VertexId>) -> Vec<VertexId> {
    let mut ids: Vec<VertexId> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
