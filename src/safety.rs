//! Offline audit of a stored graph against the DAG invariants.
//!
//! [`crate::SqliteDag::create_edge`] keeps a database clean on its own; these checks
//! are for files written by other tools or older schema revisions. The cycle check is
//! Kahn's algorithm over the full edge list and shares no code with the closure engine.

use std::{collections::VecDeque, fmt, result};

use ahash::AHashMap;
use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{dag::SqliteDag, errors::DagError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub total_vertices: i64,
    pub total_edges: i64,
    pub orphan_edges: i64,
    pub self_loops: i64,
    pub duplicate_edges: i64,
    pub back_loops: i64,
    pub cyclic_vertices: i64,
}

impl SafetyReport {
    pub fn merge(&mut self, other: &SafetyReport) {
        self.total_vertices = self.total_vertices.max(other.total_vertices);
        self.total_edges = self.total_edges.max(other.total_edges);
        self.orphan_edges += other.orphan_edges;
        self.self_loops += other.self_loops;
        self.duplicate_edges += other.duplicate_edges;
        self.back_loops += other.back_loops;
        self.cyclic_vertices += other.cyclic_vertices;
    }

    pub fn has_issues(&self) -> bool {
        self.orphan_edges > 0
            || self.self_loops > 0
            || self.duplicate_edges > 0
            || self.back_loops > 0
            || self.cyclic_vertices > 0
    }
}

#[derive(Debug)]
pub struct SafetyError {
    pub report: SafetyReport,
    pub source: Option<DagError>,
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(err) => write!(f, "safety checks failed: {err}"),
            None => write!(f, "DAG invariant violations detected"),
        }
    }
}

impl std::error::Error for SafetyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &dyn std::error::Error)
    }
}

pub fn validate_referential_integrity(dag: &SqliteDag) -> Result<SafetyReport, DagError> {
    let mut report = base_report(dag)?;
    report.orphan_edges = query_single(
        dag,
        "SELECT COUNT(*) FROM dag_edges e \
         LEFT JOIN dag_vertices src ON src.id = e.source_id \
         LEFT JOIN dag_vertices dst ON dst.id = e.target_id \
         WHERE src.id IS NULL OR dst.id IS NULL",
    )?;
    Ok(report)
}

/// Counts self-loops, surplus parallel edges and reversed pairs.
pub fn validate_edge_shapes(dag: &SqliteDag) -> Result<SafetyReport, DagError> {
    let mut report = base_report(dag)?;
    report.self_loops = query_single(
        dag,
        "SELECT COUNT(*) FROM dag_edges WHERE source_id = target_id",
    )?;
    report.duplicate_edges = query_single(
        dag,
        "SELECT COALESCE(SUM(cnt - 1), 0) FROM ( \
             SELECT COUNT(*) AS cnt FROM dag_edges \
             GROUP BY source_id, target_id \
             HAVING cnt > 1 \
         )",
    )?;
    report.back_loops = query_single(
        dag,
        "SELECT COUNT(*) FROM ( \
             SELECT DISTINCT a.source_id, a.target_id FROM dag_edges a \
             JOIN dag_edges b ON a.source_id = b.target_id AND a.target_id = b.source_id \
             WHERE a.source_id < a.target_id \
         )",
    )?;
    Ok(report)
}

/// Reports how many vertices lie on a cycle or downstream of one, i.e. are never
/// released by a topological sort. Self-loops count as cycles.
pub fn validate_acyclic(dag: &SqliteDag) -> Result<SafetyReport, DagError> {
    let mut report = base_report(dag)?;
    let edges = dag.edges()?;
    let mut in_degree: AHashMap<i64, usize> = AHashMap::new();
    let mut outgoing: AHashMap<i64, Vec<i64>> = AHashMap::new();
    for edge in &edges {
        in_degree.entry(edge.source_id).or_insert(0);
        *in_degree.entry(edge.target_id).or_insert(0) += 1;
        outgoing
            .entry(edge.source_id)
            .or_default()
            .push(edge.target_id);
    }
    let mut ready: VecDeque<i64> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut released = 0usize;
    while let Some(id) = ready.pop_front() {
        released += 1;
        for target in outgoing.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(target) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*target);
                }
            }
        }
    }
    report.cyclic_vertices = (in_degree.len() - released) as i64;
    Ok(report)
}

pub fn run_safety_checks(dag: &SqliteDag) -> Result<SafetyReport, DagError> {
    let mut report = SafetyReport::default();
    report.merge(&validate_referential_integrity(dag)?);
    report.merge(&validate_edge_shapes(dag)?);
    report.merge(&validate_acyclic(dag)?);
    Ok(report)
}

pub fn run_strict_safety_checks(dag: &SqliteDag) -> result::Result<(), SafetyError> {
    let report = run_safety_checks(dag).map_err(|err| SafetyError {
        report: SafetyReport::default(),
        source: Some(err),
    })?;
    if report.has_issues() {
        Err(SafetyError {
            report,
            source: None,
        })
    } else {
        Ok(())
    }
}

fn base_report(dag: &SqliteDag) -> Result<SafetyReport, DagError> {
    Ok(SafetyReport {
        total_vertices: dag.vertex_count()?,
        total_edges: dag.edge_count()?,
        ..SafetyReport::default()
    })
}

fn query_single(dag: &SqliteDag, sql: &str) -> Result<i64, DagError> {
    dag.store()
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .optional()
        .map(|opt| opt.unwrap_or(0))
        .map_err(|e| DagError::query(e.to_string()))
}
