use std::{sync::Arc, time::Duration};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sqlitedag::{
    SqliteDag,
    bench_utils::{DagDataset, DagShape, generate_dag, random_candidates},
};

const LINE_SEED: u64 = 0xA17C;
const RANDOM_SEED: u64 = 0xB25F;
const CANDIDATE_SEED: u64 = 0xC3D9;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);

struct BenchCase {
    id: String,
    dataset: Arc<DagDataset>,
}

fn bench_scales() -> &'static [usize] {
    #[cfg(feature = "bench-ci")]
    {
        &[200, 500]
    }
    #[cfg(not(feature = "bench-ci"))]
    {
        &[1_000, 5_000]
    }
}

fn bench_cases() -> Vec<BenchCase> {
    let mut cases = Vec::new();
    for &vertices in bench_scales() {
        let line = generate_dag(DagShape::Line, vertices, LINE_SEED + vertices as u64);
        cases.push(BenchCase {
            id: format!("line_{vertices}"),
            dataset: Arc::new(line),
        });
        let random = generate_dag(
            DagShape::RandomForward {
                edges: vertices.saturating_mul(3),
            },
            vertices,
            RANDOM_SEED + vertices as u64,
        );
        cases.push(BenchCase {
            id: format!("random_{vertices}"),
            dataset: Arc::new(random),
        });
    }
    cases
}

fn bench_load_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_edge_load");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for case in bench_cases() {
        let dataset = case.dataset.clone();
        group.bench_function(BenchmarkId::from_parameter(case.id), |b| {
            b.iter(|| {
                let dag = SqliteDag::open_in_memory().expect("dag");
                dataset.load(&dag).expect("load");
            });
        });
    }
    group.finish();
}

fn bench_rejections(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_edge_validate");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for case in bench_cases() {
        let dag = SqliteDag::open_in_memory().expect("dag");
        let ids = case.dataset.load(&dag).expect("load");
        let candidates = random_candidates(ids.len(), 64, CANDIDATE_SEED);
        group.bench_function(BenchmarkId::from_parameter(case.id), |b| {
            b.iter(|| {
                for &(source, target) in &candidates {
                    // admitted candidates are removed again to keep the graph fixed
                    if let Ok(edge) = dag.create_edge(ids[source], ids[target]) {
                        dag.delete_edge(edge.id).expect("delete");
                    }
                }
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = insert_benches;
    config = Criterion::default();
    targets = bench_load_dataset, bench_rejections
);
criterion_main!(insert_benches);
