//! Estimator benchmarks on synthetic ring-lattice graphs.
//!
//! Focus:
//! - truncated Katz (four dense matrix products per run)
//! - collective regression from a fixed seed
//! - normalization alone, as the shared baseline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use credence_core::{
    normalize, partition, predict_veracity_truncated_katz, propagate, EvidenceSet, KatzConfig,
    NodeId, ObservationCounts, PropagationConfig, TrustGraph,
};

const SIZES: [usize; 3] = [32, 128, 256];

/// Ring with chords to the next three neighbors; every seventh node is evidence.
fn lattice(n: usize) -> (TrustGraph, EvidenceSet) {
    let mut graph = TrustGraph::new();
    for i in 0..n {
        graph
            .add_node(format!("n{}", i), ObservationCounts::default())
            .expect("node");
    }
    for i in 0..n {
        for hop in 1..=3 {
            let j = (i + hop) % n;
            graph
                .add_edge(NodeId(i as u32), NodeId(j as u32))
                .expect("edge");
        }
    }
    let evidence = EvidenceSet::new(
        (0..n)
            .step_by(7)
            .map(|i| (NodeId(i as u32), if i % 2 == 0 { 0.9 } else { 0.1 })),
        n,
    )
    .expect("evidence");
    (graph, evidence)
}

fn bench_estimators(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimators");
    group.sample_size(20);

    for n in SIZES {
        let (graph, evidence) = lattice(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("normalize", n), &graph, |b, g| {
            b.iter(|| normalize(black_box(g)).expect("normalize"))
        });

        group.bench_with_input(BenchmarkId::new("truncated_katz", n), &graph, |b, g| {
            b.iter(|| {
                predict_veracity_truncated_katz(black_box(g), &evidence, &KatzConfig::default())
                    .expect("katz")
            })
        });

        let parts = partition(&normalize(&graph).expect("normalize"), &evidence).expect("partition");
        let config = PropagationConfig {
            rng_seed: Some(42),
            ..PropagationConfig::with_alpha(0.9)
        };
        group.bench_with_input(BenchmarkId::new("collective_regression", n), &parts, |b, p| {
            b.iter(|| propagate(black_box(p), &config, None).expect("propagate"))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_estimators);
criterion_main!(benches);
