//! Evidence sets and the evidence/unknown partition of the adjacency matrix.
//!
//! Evidence nodes carry a known veracity. The partition removes them from the
//! solved system: the optimizer only works on unknown nodes, while evidence
//! enters as fixed bias terms.

use crate::engine::errors::CredenceError;
use crate::engine::graph::{NodeId, TrustGraph};
use crate::engine::matrix::DenseMatrix;

/// Rule for promoting observed nodes to evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceSelection {
    /// Minimum `true_count + false_count` for a node to count as evidence.
    pub min_observations: u64,
}

impl Default for EvidenceSelection {
    fn default() -> Self {
        Self { min_observations: 3 }
    }
}

/// Validated set of `(node, known veracity)` pairs, sorted by node index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceSet {
    entries: Vec<(NodeId, f64)>,
}

impl EvidenceSet {
    /// Builds an evidence set for a graph of `node_count` nodes.
    ///
    /// Fails on out-of-range or duplicate indices and on values outside [0,1].
    pub fn new(
        entries: impl IntoIterator<Item = (NodeId, f64)>,
        node_count: usize,
    ) -> Result<Self, CredenceError> {
        let mut entries: Vec<(NodeId, f64)> = entries.into_iter().collect();
        for &(id, value) in &entries {
            if id.index() >= node_count {
                return Err(CredenceError::ValidationError(format!(
                    "evidence index {} outside graph of {} nodes",
                    id.0, node_count
                )));
            }
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(CredenceError::ValidationError(format!(
                    "evidence value {} for node {} must be within [0, 1]",
                    value, id.0
                )));
            }
        }
        entries.sort_by_key(|(id, _)| *id);
        if let Some(pair) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(CredenceError::ValidationError(format!(
                "duplicate evidence index {}",
                pair[0].0 .0
            )));
        }
        Ok(Self { entries })
    }

    /// Evidence from named values; every name must exist in `graph`.
    pub fn from_names<'a>(
        graph: &TrustGraph,
        named: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, CredenceError> {
        let mut entries = Vec::new();
        for (name, value) in named {
            let id = graph.node_id(name).ok_or_else(|| {
                CredenceError::ValidationError(format!("evidence node '{}' not in graph", name))
            })?;
            entries.push((id, value));
        }
        Self::new(entries, graph.len())
    }

    /// Nodes with enough observations, valued at their Laplace prior.
    pub fn from_priors(
        graph: &TrustGraph,
        selection: &EvidenceSelection,
    ) -> Result<Self, CredenceError> {
        let entries = graph
            .nodes()
            .iter()
            .filter(|node| node.counts.total() >= selection.min_observations)
            .map(|node| (node.id, node.counts.prior_value()));
        Self::new(entries, graph.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(NodeId, f64)] {
        &self.entries
    }

    pub fn indices(&self) -> Vec<usize> {
        self.entries.iter().map(|(id, _)| id.index()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.value_of(id).is_some()
    }

    pub fn value_of(&self, id: NodeId) -> Option<f64> {
        self.entries
            .binary_search_by_key(&id, |(node, _)| *node)
            .ok()
            .map(|pos| self.entries[pos].1)
    }

    /// Ascending indices in `0..node_count` that are not evidence.
    pub fn unknown_indices(&self, node_count: usize) -> Vec<usize> {
        let mut is_evidence = vec![false; node_count];
        for (id, _) in &self.entries {
            if let Some(slot) = is_evidence.get_mut(id.index()) {
                *slot = true;
            }
        }
        (0..node_count).filter(|&i| !is_evidence[i]).collect()
    }

    /// 1 for unknown nodes, 0 for evidence nodes.
    pub fn mask_vector(&self, node_count: usize) -> Vec<f64> {
        let mut mask = vec![1.0; node_count];
        for (id, _) in &self.entries {
            if let Some(slot) = mask.get_mut(id.index()) {
                *slot = 0.0;
            }
        }
        mask
    }
}

/// Adjacency matrix split into unknown and evidence blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Unknown rows × unknown columns.
    pub a1: DenseMatrix,
    /// Evidence rows × unknown columns.
    pub a2: DenseMatrix,
    /// `A[unknown, evidence] · values`: evidence pull on each unknown node.
    pub b: Vec<f64>,
    /// `A[evidence, evidence] · values`: evidence pull on each evidence node.
    pub c: Vec<f64>,
    /// Original indices of the unknown nodes, ascending.
    pub unknown: Vec<usize>,
    /// Original indices of the evidence nodes, ascending.
    pub evidence_indices: Vec<usize>,
    /// Known values aligned with `evidence_indices`.
    pub evidence_values: Vec<f64>,
}

impl Partition {
    pub fn unknown_len(&self) -> usize {
        self.unknown.len()
    }

    pub fn evidence_len(&self) -> usize {
        self.evidence_indices.len()
    }
}

/// Splits the row-stochastic matrix `a` by the evidence set.
///
/// Both axes drop the same evidence indices in the same order; the blocks keep
/// the weights inherited from `a` and are not renormalized.
pub fn partition(a: &DenseMatrix, evidence: &EvidenceSet) -> Result<Partition, CredenceError> {
    if !a.is_square() {
        return Err(CredenceError::DimensionMismatch(format!(
            "partition: adjacency must be square, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    let n = a.rows();
    if n == 0 {
        return Err(CredenceError::ValidationError(
            "partition: adjacency has no nodes".into(),
        ));
    }
    let evidence_indices = evidence.indices();
    if let Some(&bad) = evidence_indices.iter().find(|&&i| i >= n) {
        return Err(CredenceError::ValidationError(format!(
            "partition: evidence index {} outside {} nodes",
            bad, n
        )));
    }
    let evidence_values = evidence.values();
    let unknown = evidence.unknown_indices(n);

    let a1 = a.select(&unknown, &unknown)?;
    let a2 = a.select(&evidence_indices, &unknown)?;
    let b = a
        .select(&unknown, &evidence_indices)?
        .mul_vec(&evidence_values)?;
    let c = a
        .select(&evidence_indices, &evidence_indices)?
        .mul_vec(&evidence_values)?;

    Ok(Partition {
        a1,
        a2,
        b,
        c,
        unknown,
        evidence_indices,
        evidence_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::adjacency::normalize;
    use crate::engine::graph::ObservationCounts;

    fn cycle(n: usize) -> TrustGraph {
        let mut g = TrustGraph::new();
        for i in 0..n {
            g.add_node(format!("n{}", i), ObservationCounts::default())
                .expect("node");
        }
        for i in 0..n {
            g.add_edge(NodeId(i as u32), NodeId(((i + 1) % n) as u32))
                .expect("edge");
        }
        g
    }

    #[test]
    fn rejects_out_of_range_and_duplicates() {
        assert!(EvidenceSet::new([(NodeId(4), 1.0)], 4).is_err());
        assert!(EvidenceSet::new([(NodeId(1), 1.0), (NodeId(1), 0.0)], 4).is_err());
        assert!(EvidenceSet::new([(NodeId(1), 1.5)], 4).is_err());
        assert!(EvidenceSet::new([(NodeId(1), f64::NAN)], 4).is_err());
    }

    #[test]
    fn entries_are_sorted_and_queryable() {
        let ev = EvidenceSet::new([(NodeId(2), 0.0), (NodeId(0), 1.0)], 4).expect("evidence");
        assert_eq!(ev.indices(), vec![0, 2]);
        assert_eq!(ev.values(), vec![1.0, 0.0]);
        assert_eq!(ev.value_of(NodeId(2)), Some(0.0));
        assert!(!ev.contains(NodeId(1)));
        assert_eq!(ev.unknown_indices(4), vec![1, 3]);
        assert_eq!(ev.mask_vector(4), vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn from_priors_selects_nodes_with_enough_observations() {
        let mut g = TrustGraph::new();
        g.add_node("few", ObservationCounts::new(1, 1)).expect("few");
        g.add_node("many", ObservationCounts::new(3, 0)).expect("many");
        g.add_node("none", ObservationCounts::default()).expect("none");
        let ev = EvidenceSet::from_priors(&g, &EvidenceSelection::default()).expect("evidence");
        assert_eq!(ev.entries(), &[(NodeId(1), 0.8)]);
    }

    #[test]
    fn partition_blocks_on_cycle() {
        let a = normalize(&cycle(4)).expect("normalize");
        let ev = EvidenceSet::new([(NodeId(0), 1.0), (NodeId(2), 0.0)], 4).expect("evidence");
        let p = partition(&a, &ev).expect("partition");

        assert_eq!(p.unknown, vec![1, 3]);
        // Unknown nodes 1 and 3 are not adjacent on a 4-cycle.
        assert_eq!(p.a1, DenseMatrix::zeros(2, 2));
        assert_eq!(
            p.a2,
            DenseMatrix::from_rows(vec![vec![0.5, 0.5], vec![0.5, 0.5]]).expect("a2")
        );
        assert_eq!(p.b, vec![0.5, 0.5]);
        assert_eq!(p.c, vec![0.0, 0.0]);
    }

    #[test]
    fn partition_without_evidence_keeps_whole_matrix() {
        let a = normalize(&cycle(3)).expect("normalize");
        let p = partition(&a, &EvidenceSet::default()).expect("partition");
        assert_eq!(p.a1, a);
        assert_eq!((p.a2.rows(), p.a2.cols()), (0, 3));
        assert_eq!(p.b, vec![0.0; 3]);
        assert!(p.c.is_empty());
    }

    #[test]
    fn partition_rejects_evidence_beyond_matrix() {
        let a = normalize(&cycle(3)).expect("normalize");
        let ev = EvidenceSet::new([(NodeId(5), 1.0)], 6).expect("evidence for larger graph");
        assert!(matches!(
            partition(&a, &ev),
            Err(CredenceError::ValidationError(_))
        ));
    }
}
