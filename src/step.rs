//! Single-hop adjacency over the edge relation.

use crate::{
    errors::DagError,
    graph::{Direction, Edge, EdgeFilter, GraphStore, VertexId},
};

/// Returns every edge whose matched endpoint (per `direction`) is in `seed_ids`.
pub(crate) fn step(
    store: &GraphStore,
    direction: Direction,
    seed_ids: &[VertexId],
) -> Result<Vec<Edge>, DagError> {
    store.query_edges(EdgeFilter::Members {
        direction,
        ids: seed_ids,
    })
}

/// Edges ending where `edge` begins.
pub(crate) fn previous(store: &GraphStore, edge: &Edge) -> Result<Vec<Edge>, DagError> {
    step(store, Direction::Backward, &[edge.source_id])
}

/// Edges starting where `edge` ends.
pub(crate) fn next(store: &GraphStore, edge: &Edge) -> Result<Vec<Edge>, DagError> {
    step(store, Direction::Forward, &[edge.target_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteConfig;

    fn diamond() -> (GraphStore, Vec<Edge>) {
        let store = GraphStore::open_in_memory(&SqliteConfig::default()).expect("store");
        for _ in 0..4 {
            store.insert_vertex().unwrap();
        }
        let mut edges = Vec::new();
        for (source_id, target_id) in [(1, 2), (1, 3), (2, 4), (3, 4)] {
            let id = store.insert_edge(source_id, target_id).unwrap();
            edges.push(Edge {
                id,
                source_id,
                target_id,
            });
        }
        (store, edges)
    }

    #[test]
    fn test_next_returns_edges_leaving_target() {
        let (store, edges) = diamond();
        let next_edges = next(&store, &edges[0]).expect("next");
        assert_eq!(next_edges, vec![edges[2]]);
        assert!(next(&store, &edges[3]).expect("sink").is_empty());
    }

    #[test]
    fn test_previous_returns_edges_entering_source() {
        let (store, edges) = diamond();
        let prev_edges = previous(&store, &edges[2]).expect("previous");
        assert_eq!(prev_edges, vec![edges[0]]);
        assert!(previous(&store, &edges[0]).expect("root").is_empty());
    }

    #[test]
    fn test_step_matches_any_seed() {
        let (store, edges) = diamond();
        let into_sink = step(&store, Direction::Backward, &[4]).expect("step");
        assert_eq!(into_sink, vec![edges[2], edges[3]]);
        let out_of_middle = step(&store, Direction::Forward, &[2, 3]).expect("step");
        assert_eq!(out_of_middle, vec![edges[2], edges[3]]);
    }
}
