//! # Trust Graph
//!
//! Undirected, unweighted graph of named nodes carrying optional observation
//! counts. This is the input to both veracity estimators.
//!
//! ## Design
//!
//! - Nodes get dense indices `0..N-1` in insertion order ([`NodeId`]); these
//!   indices are the row/column order of every matrix built from the graph.
//! - Display names are unique and act as node identity across graphs, which
//!   is what [`TrustGraph::merged_with`] joins on.
//! - Edges are binary: duplicates collapse, self-loops are stored once.
//! - Neighbor lists are kept sorted so iteration is deterministic.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::errors::CredenceError;

/// Maximum neighbors stored inline before a neighbor list spills to the heap.
const INLINE_NEIGHBORS: usize = 8;

/// Dense index of a node within one [`TrustGraph`].
///
/// NodeId implements Ord/PartialOrd for stable, deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Corroborating and refuting observation counts for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationCounts {
    pub true_count: Option<u64>,
    pub false_count: Option<u64>,
}

impl ObservationCounts {
    pub fn new(true_count: u64, false_count: u64) -> Self {
        Self {
            true_count: Some(true_count),
            false_count: Some(false_count),
        }
    }

    /// Total number of observations; missing counts are zero.
    pub fn total(&self) -> u64 {
        self.true_count.unwrap_or(0) + self.false_count.unwrap_or(0)
    }

    /// Laplace-smoothed proportion of corroborating observations.
    ///
    /// `(true + 1) / (true + false + 2)`, so a node without observations has
    /// prior 0.5.
    pub fn prior_value(&self) -> f64 {
        let t = self.true_count.unwrap_or(0) as f64;
        (t + 1.0) / (self.total() as f64 + 2.0)
    }

    fn is_empty(&self) -> bool {
        self.true_count.is_none() && self.false_count.is_none()
    }
}

/// A node in the trust graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub id: NodeId,
    pub name: Arc<str>,
    pub counts: ObservationCounts,
}

/// Undirected graph with unique node names.
#[derive(Debug, Clone, Default)]
pub struct TrustGraph {
    nodes: Vec<NodeData>,
    neighbors: Vec<SmallVec<[NodeId; INLINE_NEIGHBORS]>>,
    by_name: FxHashMap<Arc<str>, NodeId>,
    edge_count: usize,
}

impl TrustGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its index. Names must be unique.
    pub fn add_node(
        &mut self,
        name: impl Into<Arc<str>>,
        counts: ObservationCounts,
    ) -> Result<NodeId, CredenceError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(CredenceError::ValidationError(format!(
                "duplicate node name '{}'",
                name
            )));
        }
        let raw = u32::try_from(self.nodes.len()).map_err(|_| {
            CredenceError::ValidationError("graph exceeds u32::MAX nodes".into())
        })?;
        let id = NodeId(raw);
        self.by_name.insert(name.clone(), id);
        self.nodes.push(NodeData { id, name, counts });
        self.neighbors.push(SmallVec::new());
        Ok(id)
    }

    /// Adds the undirected edge `{a, b}`. Returns `false` if it already existed.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<bool, CredenceError> {
        for id in [a, b] {
            if id.index() >= self.nodes.len() {
                return Err(CredenceError::ValidationError(format!(
                    "edge endpoint {:?} outside graph of {} nodes",
                    id,
                    self.nodes.len()
                )));
            }
        }
        let inserted = insert_sorted(&mut self.neighbors[a.index()], b);
        if inserted && a != b {
            insert_sorted(&mut self.neighbors[b.index()], a);
        }
        if inserted {
            self.edge_count += 1;
        }
        Ok(inserted)
    }

    /// Adds an edge between two named nodes.
    pub fn add_edge_by_name(&mut self, a: &str, b: &str) -> Result<bool, CredenceError> {
        let a = self.require(a)?;
        let b = self.require(b)?;
        self.add_edge(a, b)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn nodes(&self) -> &[NodeData] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.index())
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Sorted neighbor list of `id` (empty for unknown ids).
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.neighbors
            .get(id.index())
            .map(|n| n.as_slice())
            .unwrap_or(&[])
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.neighbors(id).len()
    }

    /// Each undirected edge once, as `(low, high)` in index order.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.neighbors.iter().enumerate().flat_map(|(idx, adjacent)| {
            let src = NodeId(idx as u32);
            adjacent
                .iter()
                .filter(move |&&dst| dst >= src)
                .map(move |&dst| (src, dst))
        })
    }

    /// Names of nodes present in both graphs, in `self`'s index order.
    pub fn shared_names(&self, other: &TrustGraph) -> Vec<Arc<str>> {
        self.nodes
            .iter()
            .filter(|n| other.contains(&n.name))
            .map(|n| n.name.clone())
            .collect()
    }

    /// Union of two graphs joined on node name.
    ///
    /// Nodes of `self` keep their indices; nodes only in `other` are appended
    /// in `other`'s order. Where both graphs carry counts for a node, those of
    /// `other` take precedence.
    pub fn merged_with(&self, other: &TrustGraph) -> TrustGraph {
        let mut merged = self.clone();
        let mut remap = Vec::with_capacity(other.len());
        for node in &other.nodes {
            let id = match merged.by_name.get(&node.name) {
                Some(&existing) => {
                    if !node.counts.is_empty() {
                        merged.nodes[existing.index()].counts = node.counts;
                    }
                    existing
                }
                None => {
                    let id = NodeId(merged.nodes.len() as u32);
                    merged.by_name.insert(node.name.clone(), id);
                    merged.nodes.push(NodeData {
                        id,
                        name: node.name.clone(),
                        counts: node.counts,
                    });
                    merged.neighbors.push(SmallVec::new());
                    id
                }
            };
            remap.push(id);
        }
        for (a, b) in other.edges() {
            let (a, b) = (remap[a.index()], remap[b.index()]);
            let inserted = insert_sorted(&mut merged.neighbors[a.index()], b);
            if inserted && a != b {
                insert_sorted(&mut merged.neighbors[b.index()], a);
            }
            if inserted {
                merged.edge_count += 1;
            }
        }
        merged
    }

    /// Nodes reachable from `start` (including it), in ascending index order.
    pub fn component_of(&self, start: NodeId) -> Vec<NodeId> {
        if start.index() >= self.nodes.len() {
            return Vec::new();
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([start]);
        seen[start.index()] = true;
        while let Some(current) = queue.pop_front() {
            for &next in self.neighbors(current) {
                if !seen[next.index()] {
                    seen[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }
        seen.iter()
            .enumerate()
            .filter(|(_, reached)| **reached)
            .map(|(idx, _)| NodeId(idx as u32))
            .collect()
    }

    /// Graph induced by `keep`, re-indexed densely in the order given.
    pub fn induced_subgraph(&self, keep: &[NodeId]) -> Result<TrustGraph, CredenceError> {
        let mut remap: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut sub = TrustGraph::new();
        for &id in keep {
            let node = self.node(id).ok_or_else(|| {
                CredenceError::ValidationError(format!(
                    "subgraph node {:?} outside graph of {} nodes",
                    id,
                    self.len()
                ))
            })?;
            let new_id = sub.add_node(node.name.clone(), node.counts)?;
            remap.insert(id, new_id);
        }
        for (a, b) in self.edges() {
            if let (Some(&a), Some(&b)) = (remap.get(&a), remap.get(&b)) {
                sub.add_edge(a, b)?;
            }
        }
        Ok(sub)
    }

    fn require(&self, name: &str) -> Result<NodeId, CredenceError> {
        self.node_id(name).ok_or_else(|| {
            CredenceError::ValidationError(format!("unknown node '{}'", name))
        })
    }
}

fn insert_sorted(list: &mut SmallVec<[NodeId; INLINE_NEIGHBORS]>, id: NodeId) -> bool {
    match list.binary_search(&id) {
        Ok(_) => false,
        Err(pos) => {
            list.insert(pos, id);
            true
        }
    }
}
