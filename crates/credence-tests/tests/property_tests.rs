//! Property tests for normalization, propagation and Katz invariants.

use credence_core::engine::katz::katz_kernel;
use credence_core::{
    katz_predict, normalize, partition, predict_veracity_truncated_katz, propagate, EvidenceSet,
    KatzConfig, NodeId, ObservationCounts, PropagationConfig, TrustGraph,
};
use proptest::prelude::*;

/// A random undirected graph plus evidence over at least one node.
#[derive(Debug, Clone)]
struct Scenario {
    graph: TrustGraph,
    evidence: EvidenceSet,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (2usize..10).prop_flat_map(|n| {
        (
            prop::collection::vec((0..n, 0..n), 0..n * 3),
            prop::collection::vec(any::<bool>(), n),
            prop::collection::vec(0.0f64..=1.0, n),
        )
            .prop_map(move |(edges, observed, values)| {
                let mut graph = TrustGraph::new();
                for i in 0..n {
                    graph
                        .add_node(format!("n{}", i), ObservationCounts::default())
                        .unwrap();
                }
                for (a, b) in edges.into_iter().filter(|(a, b)| a != b) {
                    graph.add_edge(NodeId(a as u32), NodeId(b as u32)).unwrap();
                }
                let entries = (0..n)
                    .filter(|&i| i == 0 || observed[i])
                    .map(|i| (NodeId(i as u32), values[i]));
                let evidence = EvidenceSet::new(entries, n).unwrap();
                Scenario { graph, evidence }
            })
    })
}

fn bounded_config(seed: u64) -> PropagationConfig {
    PropagationConfig {
        max_iterations: 500,
        rng_seed: Some(seed),
        ..PropagationConfig::with_alpha(0.9)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn normalized_rows_sum_to_one_or_zero(s in scenario()) {
        let a = normalize(&s.graph).unwrap();
        for (i, sum) in a.row_sums().into_iter().enumerate() {
            let degree = s.graph.degree(NodeId(i as u32));
            if degree == 0 {
                prop_assert_eq!(sum, 0.0);
            } else {
                prop_assert!((sum - 1.0).abs() < 1e-9, "row {} sums to {}", i, sum);
            }
        }
        prop_assert!(a.as_slice().iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn propagation_stays_in_unit_box(s in scenario(), seed in any::<u64>()) {
        let parts = partition(&normalize(&s.graph).unwrap(), &s.evidence).unwrap();
        let outcome = propagate(&parts, &bounded_config(seed), None).unwrap();
        prop_assert_eq!(outcome.veracity.len(), parts.unknown_len());
        prop_assert!(outcome.veracity.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn accepted_objective_never_increases(s in scenario(), seed in any::<u64>()) {
        let parts = partition(&normalize(&s.graph).unwrap(), &s.evidence).unwrap();
        let config = PropagationConfig { learning_rate: 2.0, ..bounded_config(seed) };
        let outcome = propagate(&parts, &config, None).unwrap();
        for pair in outcome.diagnostics.objective_trace.windows(2) {
            prop_assert!(pair[1] <= pair[0], "objective rose from {} to {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn katz_kernel_has_zero_diagonal(s in scenario(), alpha in 0.05f64..1.0) {
        let kernel = katz_kernel(&normalize(&s.graph).unwrap(), alpha).unwrap();
        for i in 0..kernel.rows() {
            prop_assert_eq!(kernel.get(i, i), 0.0);
        }
    }

    #[test]
    fn katz_predicts_only_unknown_nodes_within_range(s in scenario()) {
        let a = normalize(&s.graph).unwrap();
        let predicted = katz_predict(&a, &s.evidence, KatzConfig::default().alpha).unwrap();
        prop_assert_eq!(predicted.len(), s.graph.len() - s.evidence.len());
        for (id, value) in predicted {
            prop_assert!(!s.evidence.contains(id));
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&value));
        }

        let named = predict_veracity_truncated_katz(&s.graph, &s.evidence, &KatzConfig::default()).unwrap();
        for &(id, _) in s.evidence.entries() {
            let name = &s.graph.node(id).unwrap().name;
            prop_assert!(!named.contains(name));
        }
    }
}
