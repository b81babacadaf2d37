//! Insert-time DAG invariant checks.
//!
//! The checks run in a fixed order, cheapest first, and the first failure is the one
//! reported. The back-loop check is subsumed by the cycle check but kept so a two-vertex
//! loop is reported as such.

use log::debug;

use crate::{
    closure::family_ids,
    errors::{DagError, Violation},
    graph::{CandidateEdge, Direction, EdgeFilter, GraphStore},
};

type Check = fn(&GraphStore, &CandidateEdge) -> Result<(), DagError>;

const PIPELINE: &[(&str, Check)] = &[
    ("self_loop", reject_self_loop),
    ("multi_edge", reject_multi_edge),
    ("back_loop", reject_back_loop),
    ("cycle", reject_cycle),
];

/// Admits `candidate` or returns the first violated invariant. Storage failures are
/// returned as they are, never as a [`Violation`].
pub(crate) fn validate(store: &GraphStore, candidate: &CandidateEdge) -> Result<(), DagError> {
    for (name, check) in PIPELINE {
        store.metrics().record_check();
        if let Err(err) = check(store, candidate) {
            debug!(
                "candidate {} -> {} failed {name} check: {err}",
                candidate.source_id, candidate.target_id
            );
            return Err(err);
        }
    }
    Ok(())
}

fn reject_self_loop(_: &GraphStore, candidate: &CandidateEdge) -> Result<(), DagError> {
    if candidate.source_id == candidate.target_id {
        return Err(Violation::SelfLoop.into());
    }
    Ok(())
}

fn reject_multi_edge(store: &GraphStore, candidate: &CandidateEdge) -> Result<(), DagError> {
    let existing = store.query_edges(EdgeFilter::Pair {
        source_id: candidate.source_id,
        target_id: candidate.target_id,
    })?;
    if !existing.is_empty() {
        return Err(Violation::MultiEdge.into());
    }
    Ok(())
}

fn reject_back_loop(store: &GraphStore, candidate: &CandidateEdge) -> Result<(), DagError> {
    let reverse = store.query_edges(EdgeFilter::Pair {
        source_id: candidate.target_id,
        target_id: candidate.source_id,
    })?;
    if !reverse.is_empty() {
        return Err(Violation::BackLoop.into());
    }
    Ok(())
}

fn reject_cycle(store: &GraphStore, candidate: &CandidateEdge) -> Result<(), DagError> {
    let descendants = family_ids(store, candidate.target_id, Direction::Forward)?;
    if descendants.binary_search(&candidate.source_id).is_ok() {
        return Err(Violation::Cycle.into());
    }
    Ok(())
}
