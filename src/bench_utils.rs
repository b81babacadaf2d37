//! Deterministic DAG datasets for benchmarks and randomized tests.
//!
//! Every generator only emits edges from a lower to a higher vertex index, so each
//! dataset is acyclic by construction and loads without rejections.

use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};

use crate::{dag::SqliteDag, errors::DagError, graph::VertexId};

#[derive(Clone, Debug)]
pub struct DagDataset {
    pub vertex_count: usize,
    /// `(source, target)` vertex indices, sorted.
    pub edges: Vec<(usize, usize)>,
}

impl DagDataset {
    pub fn vertices(&self) -> usize {
        self.vertex_count
    }

    pub fn edges(&self) -> usize {
        self.edges.len()
    }

    /// Index of the vertex with the most outgoing edges, lowest index on ties.
    pub fn widest_root(&self) -> usize {
        let mut counts = vec![0usize; self.vertex_count];
        for &(source, _) in &self.edges {
            counts[source] += 1;
        }
        let mut best = (0usize, 0usize);
        for (idx, count) in counts.into_iter().enumerate() {
            if count > best.0 {
                best = (count, idx);
            }
        }
        best.1
    }

    /// Inserts the dataset through `create_edge` and returns the vertex id of each index.
    pub fn load(&self, dag: &SqliteDag) -> Result<Vec<VertexId>, DagError> {
        let mut id_map = Vec::with_capacity(self.vertex_count);
        for _ in 0..self.vertex_count {
            id_map.push(dag.insert_vertex()?);
        }
        for &(source, target) in &self.edges {
            dag.create_edge(id_map[source], id_map[target])?;
        }
        Ok(id_map)
    }
}

#[derive(Clone, Debug)]
pub enum DagShape {
    Line,
    Star,
    Grid2D { width: usize, height: usize },
    RandomForward { edges: usize },
}

pub fn generate_dag(shape: DagShape, vertex_count: usize, seed: u64) -> DagDataset {
    assert!(vertex_count > 1, "vertex_count must exceed 1");
    let mut edges = match shape {
        DagShape::Line => (0..vertex_count - 1).map(|idx| (idx, idx + 1)).collect(),
        DagShape::Star => (1..vertex_count).map(|leaf| (0, leaf)).collect(),
        DagShape::Grid2D { width, height } => generate_grid_edges(width, height, vertex_count),
        DagShape::RandomForward { edges } => generate_random_edges(vertex_count, edges, seed),
    };
    edges.sort_unstable();
    DagDataset {
        vertex_count,
        edges,
    }
}

/// Random `(source, target)` index pairs, self-loops included, for exercising the
/// validator with candidates it must reject.
pub fn random_candidates(vertex_count: usize, count: usize, seed: u64) -> Vec<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            (
                rng.gen_range(0..vertex_count),
                rng.gen_range(0..vertex_count),
            )
        })
        .collect()
}

fn generate_grid_edges(width: usize, height: usize, vertex_count: usize) -> Vec<(usize, usize)> {
    assert_eq!(
        width * height,
        vertex_count,
        "grid dimensions must match vertex count"
    );
    let mut edges = Vec::with_capacity(width * height * 2);
    for y in 0..height {
        for x in 0..width {
            let base = y * width + x;
            if x + 1 < width {
                edges.push((base, base + 1));
            }
            if y + 1 < height {
                edges.push((base, base + width));
            }
        }
    }
    edges
}

fn generate_random_edges(vertex_count: usize, edge_count: usize, seed: u64) -> Vec<(usize, usize)> {
    let total_pairs = pair_count(vertex_count);
    assert!(
        edge_count as u128 <= total_pairs,
        "edge_count exceeds possible pairs"
    );
    let mut rng = StdRng::seed_from_u64(seed);
    // distinct linear indices, so every requested edge is produced exactly once
    index::sample(&mut rng, total_pairs as usize, edge_count)
        .into_iter()
        .map(|idx| {
            let (source, target) = pair_from_index(idx as u64, vertex_count as u64);
            (source as usize, target as usize)
        })
        .collect()
}

fn pair_count(vertices: usize) -> u128 {
    let n = vertices as u128;
    n * (n - 1) / 2
}

/// Maps a linear index over all `left < right` pairs back to the pair.
fn pair_from_index(idx: u64, vertices: u64) -> (u64, u64) {
    let mut left = 0;
    let mut start = 0u64;
    while left < vertices - 1 {
        let remaining = vertices - left - 1;
        if idx < start + remaining {
            return (left, left + 1 + (idx - start));
        }
        start += remaining;
        left += 1;
    }
    (vertices - 2, vertices - 1)
}
