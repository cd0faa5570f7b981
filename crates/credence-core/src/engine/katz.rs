//! Truncated Katz veracity estimator.
//!
//! Similarity between nodes is a decayed sum of walk weights on the
//! row-stochastic adjacency matrix:
//!
//! ```text
//! K = alpha·A + alpha²·A² + alpha³·A³ + alpha⁴·A⁵
//! ```
//!
//! The last term uses the fifth matrix power. Changing it changes every
//! prediction, so the series is fixed in [`KATZ_TERMS`]. Self-similarity is
//! zeroed, and an unknown node's veracity is the `K`-weighted mean of the
//! evidence values. A node with no weight toward any evidence node gets 0.

use crate::engine::adjacency::normalize;
use crate::engine::errors::CredenceError;
use crate::engine::evidence::EvidenceSet;
use crate::engine::graph::{NodeId, TrustGraph};
use crate::engine::matrix::DenseMatrix;
use crate::engine::prediction::VeracityPrediction;

pub const DEFAULT_KATZ_ALPHA: f64 = 0.75;

/// `(alpha exponent, matrix power)` for each term of the series.
pub const KATZ_TERMS: [(i32, u32); 4] = [(1, 1), (2, 2), (3, 3), (4, 5)];

/// Configuration for the truncated Katz estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KatzConfig {
    /// Decay applied per walk step.
    pub alpha: f64,
}

impl Default for KatzConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_KATZ_ALPHA,
        }
    }
}

impl KatzConfig {
    pub fn validate(self) -> Result<Self, CredenceError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(CredenceError::ValidationError(
                "katz: alpha must be finite and > 0".into(),
            ));
        }
        Ok(self)
    }
}

/// The raw truncated series, diagonal included.
pub fn truncated_katz(a: &DenseMatrix, alpha: f64) -> Result<DenseMatrix, CredenceError> {
    let alpha = KatzConfig { alpha }.validate()?.alpha;
    if !a.is_square() {
        return Err(CredenceError::DimensionMismatch(format!(
            "katz: adjacency must be square, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }

    let mut kernel = DenseMatrix::zeros(a.rows(), a.cols());
    let mut power = a.clone();
    let mut exponent = 1;
    for (alpha_exponent, matrix_power) in KATZ_TERMS {
        while exponent < matrix_power {
            power = power.matmul(a)?;
            exponent += 1;
        }
        kernel.add_scaled(&power, alpha.powi(alpha_exponent))?;
    }
    if !kernel.is_finite() {
        return Err(CredenceError::Numerical(
            "katz: kernel contains NaN or infinite values".into(),
        ));
    }
    Ok(kernel)
}

/// The similarity kernel used for prediction: the series with `K[i][i] = 0`.
pub fn katz_kernel(a: &DenseMatrix, alpha: f64) -> Result<DenseMatrix, CredenceError> {
    let mut kernel = truncated_katz(a, alpha)?;
    kernel.fill_diagonal(0.0);
    Ok(kernel)
}

/// Evidence-weighted veracity for every non-evidence index of `a`.
///
/// Results are in ascending node order.
pub fn katz_predict(
    a: &DenseMatrix,
    evidence: &EvidenceSet,
    alpha: f64,
) -> Result<Vec<(NodeId, f64)>, CredenceError> {
    if a.rows() == 0 {
        return Err(CredenceError::ValidationError(
            "katz: adjacency has no nodes".into(),
        ));
    }
    let kernel = katz_kernel(a, alpha)?;
    let n = kernel.rows();
    if let Some((id, _)) = evidence.entries().iter().find(|(id, _)| id.index() >= n) {
        return Err(CredenceError::ValidationError(format!(
            "katz: evidence index {} outside {} nodes",
            id.0, n
        )));
    }

    let mut out = Vec::with_capacity(n - evidence.len());
    for i in evidence.unknown_indices(n) {
        let row = kernel.row(i);
        let (weighted, total) = evidence
            .entries()
            .iter()
            .fold((0.0, 0.0), |(weighted, total), &(id, value)| {
                let k = row[id.index()];
                (weighted + k * value, total + k)
            });
        let veracity = if total > 0.0 { weighted / total } else { 0.0 };
        out.push((NodeId(i as u32), veracity));
    }
    Ok(out)
}

/// Truncated-Katz veracity for every non-evidence node of `graph`.
pub fn predict_veracity_truncated_katz(
    graph: &TrustGraph,
    evidence: &EvidenceSet,
    config: &KatzConfig,
) -> Result<VeracityPrediction, CredenceError> {
    let config = config.validate()?;
    let a = normalize(graph)?;
    let predicted = katz_predict(&a, evidence, config.alpha)?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        nodes = graph.len(),
        evidence = evidence.len(),
        unreached = predicted.iter().filter(|(_, v)| *v == 0.0).count(),
        "truncated katz finished"
    );

    VeracityPrediction::from_indexed(graph, predicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::ObservationCounts;

    fn graph(n: usize, edges: &[(u32, u32)]) -> TrustGraph {
        let mut g = TrustGraph::new();
        for i in 0..n {
            g.add_node(format!("n{}", i), ObservationCounts::default())
                .expect("node");
        }
        for &(a, b) in edges {
            g.add_edge(NodeId(a), NodeId(b)).expect("edge");
        }
        g
    }

    #[test]
    fn series_uses_fifth_power_for_last_term() {
        // On a single edge A is the swap matrix: odd powers are A, even are I.
        let a = normalize(&graph(2, &[(0, 1)])).expect("normalize");
        let alpha: f64 = 0.5;
        let k = truncated_katz(&a, alpha).expect("katz");
        let off_diagonal = alpha + alpha.powi(3) + alpha.powi(4);
        let diagonal = alpha.powi(2);
        assert!((k.get(0, 1) - off_diagonal).abs() < 1e-12);
        assert!((k.get(0, 0) - diagonal).abs() < 1e-12);
    }

    #[test]
    fn kernel_diagonal_is_zero() {
        let a = normalize(&graph(4, &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)])).expect("normalize");
        let k = katz_kernel(&a, DEFAULT_KATZ_ALPHA).expect("kernel");
        for i in 0..4 {
            assert_eq!(k.get(i, i), 0.0);
        }
    }

    #[test]
    fn four_cycle_midpoint() {
        let g = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 0)]);
        let ev = EvidenceSet::new([(NodeId(0), 1.0), (NodeId(2), 0.0)], 4).expect("evidence");
        let prediction =
            predict_veracity_truncated_katz(&g, &ev, &KatzConfig::default()).expect("predict");
        assert_eq!(prediction.len(), 2);
        let v1 = prediction.get("n1").expect("n1");
        let v3 = prediction.get("n3").expect("n3");
        assert!((v1 - 0.5).abs() < 1e-12);
        assert!((v1 - v3).abs() < 1e-12);
    }

    #[test]
    fn unreachable_nodes_get_zero() {
        // n2 - n3 is a separate component with no evidence.
        let g = graph(4, &[(0, 1), (2, 3)]);
        let ev = EvidenceSet::new([(NodeId(0), 0.8)], 4).expect("evidence");
        let predicted = katz_predict(&normalize(&g).expect("normalize"), &ev, 0.75).expect("predict");
        let ids: Vec<NodeId> = predicted.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!((predicted[0].1 - 0.8).abs() < 1e-12);
        assert_eq!(predicted[1].1, 0.0);
        assert_eq!(predicted[2].1, 0.0);
    }

    #[test]
    fn rejects_invalid_alpha_and_shape() {
        let a = DenseMatrix::identity(2);
        assert!(truncated_katz(&a, 0.0).is_err());
        assert!(truncated_katz(&a, f64::NAN).is_err());
        assert!(matches!(
            truncated_katz(&DenseMatrix::zeros(2, 3), 0.75),
            Err(CredenceError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn empty_adjacency_is_rejected() {
        let evidence = EvidenceSet::default();
        assert!(matches!(
            katz_predict(&DenseMatrix::zeros(0, 0), &evidence, DEFAULT_KATZ_ALPHA),
            Err(CredenceError::ValidationError(_))
        ));
    }
}
