//! Ego-node veracity queries against an evidence snapshot.
//!
//! A query supplies a small sub-graph around an ego node. It is merged with
//! the evidence graph on node names, restricted to the ego's connected
//! component, and handed to one of the estimators. Three outcomes are kept
//! apart: the ego is itself evidence, a prediction was made, or there is no
//! path to any evidence at all. The last one is never reported as a
//! zero veracity.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::engine::errors::CredenceError;
use crate::engine::evidence::{EvidenceSelection, EvidenceSet};
use crate::engine::graph::TrustGraph;
use crate::engine::katz::{predict_veracity_truncated_katz, KatzConfig};
use crate::engine::prediction::VeracityPrediction;
use crate::engine::propagation::{predict_veracity_collective_regression, PropagationConfig};

/// Alpha used for collective regression in queries.
pub const QUERY_PROPAGATION_ALPHA: f64 = 0.9;

/// Estimator selected for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Truncated Katz similarity (`"katz"`).
    #[cfg_attr(feature = "serde", serde(rename = "katz"))]
    Katz,
    /// Gradient-descent collective regression (`"cr"`).
    #[cfg_attr(feature = "serde", serde(rename = "cr"))]
    CollectiveRegression,
}

impl FromStr for Strategy {
    type Err = CredenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "katz" => Ok(Strategy::Katz),
            "cr" => Ok(Strategy::CollectiveRegression),
            other => Err(CredenceError::ValidationError(format!(
                "unknown strategy '{}' (expected 'katz' or 'cr')",
                other
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Katz => write!(f, "katz"),
            Strategy::CollectiveRegression => write!(f, "cr"),
        }
    }
}

/// Estimator settings for queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryConfig {
    pub katz: KatzConfig,
    pub propagation: PropagationConfig,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            katz: KatzConfig::default(),
            propagation: PropagationConfig::with_alpha(QUERY_PROPAGATION_ALPHA),
        }
    }
}

/// Answer to a single ego query.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "outcome", rename_all = "snake_case")
)]
pub enum QueryAnswer {
    /// The ego is an evidence node; its known value is returned as-is.
    Evidence { value: f64 },
    /// Veracity predicted by the selected estimator.
    Predicted { value: f64 },
    /// No evidence node is reachable from the ego.
    NoEvidencePath,
}

impl QueryAnswer {
    /// The numeric veracity, if there is one.
    pub fn value(&self) -> Option<f64> {
        match self {
            QueryAnswer::Evidence { value } | QueryAnswer::Predicted { value } => Some(*value),
            QueryAnswer::NoEvidencePath => None,
        }
    }
}

/// Immutable evidence graph and evidence values, shared across queries.
///
/// Built once and passed to every query. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct EvidenceSnapshot {
    graph: Arc<TrustGraph>,
    values: Arc<FxHashMap<Arc<str>, f64>>,
}

impl EvidenceSnapshot {
    /// Selects evidence from observation counts in `graph`.
    pub fn new(graph: TrustGraph, selection: &EvidenceSelection) -> Result<Self, CredenceError> {
        let evidence = EvidenceSet::from_priors(&graph, selection)?;
        Self::with_evidence(graph, &evidence)
    }

    /// Uses an explicit evidence set over `graph`.
    pub fn with_evidence(graph: TrustGraph, evidence: &EvidenceSet) -> Result<Self, CredenceError> {
        let mut values = FxHashMap::default();
        for &(id, value) in evidence.entries() {
            let node = graph.node(id).ok_or_else(|| {
                CredenceError::ValidationError(format!(
                    "evidence index {} outside graph of {} nodes",
                    id.0,
                    graph.len()
                ))
            })?;
            values.insert(node.name.clone(), value);
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            nodes = graph.len(),
            evidence = values.len(),
            "evidence snapshot ready"
        );

        Ok(Self {
            graph: Arc::new(graph),
            values: Arc::new(values),
        })
    }

    pub fn graph(&self) -> &TrustGraph {
        &self.graph
    }

    pub fn evidence_len(&self) -> usize {
        self.values.len()
    }

    /// Known veracity of an evidence node.
    pub fn evidence_value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Evidence set re-indexed for another graph that shares node names.
    fn evidence_for(&self, graph: &TrustGraph) -> Result<EvidenceSet, CredenceError> {
        let entries = graph
            .nodes()
            .iter()
            .filter_map(|node| self.values.get(&node.name).map(|&v| (node.id, v)));
        EvidenceSet::new(entries, graph.len())
    }
}

/// Answers a veracity query for `ego`.
pub fn answer_query(
    snapshot: &EvidenceSnapshot,
    query_graph: &TrustGraph,
    ego: &str,
    strategy: Strategy,
    config: &QueryConfig,
) -> Result<QueryAnswer, CredenceError> {
    if let Some(value) = snapshot.evidence_value(ego) {
        return Ok(QueryAnswer::Evidence { value });
    }
    if !query_graph.contains(ego) && !snapshot.graph().contains(ego) {
        return Err(CredenceError::ValidationError(format!(
            "ego node '{}' is in neither the query nor the evidence graph",
            ego
        )));
    }
    if query_graph.shared_names(snapshot.graph()).is_empty() {
        return Ok(QueryAnswer::NoEvidencePath);
    }

    let merged = query_graph.merged_with(snapshot.graph());
    let Some(prediction) = predict_component(snapshot, &merged, ego, strategy, config)? else {
        return Ok(QueryAnswer::NoEvidencePath);
    };
    prediction
        .get(ego)
        .map(|value| QueryAnswer::Predicted { value })
        .ok_or_else(|| {
            CredenceError::Internal(format!("prediction for '{}' missing from estimator output", ego))
        })
}

/// Answers for every node of the query graph, keyed by name.
pub fn answer_all(
    snapshot: &EvidenceSnapshot,
    query_graph: &TrustGraph,
    strategy: Strategy,
    config: &QueryConfig,
) -> Result<BTreeMap<String, QueryAnswer>, CredenceError> {
    let mut answers = BTreeMap::new();
    if query_graph.shared_names(snapshot.graph()).is_empty() {
        for node in query_graph.nodes() {
            let answer = match snapshot.evidence_value(&node.name) {
                Some(value) => QueryAnswer::Evidence { value },
                None => QueryAnswer::NoEvidencePath,
            };
            answers.insert(node.name.to_string(), answer);
        }
        return Ok(answers);
    }

    let merged = query_graph.merged_with(snapshot.graph());
    // One estimator run per connected component that the query touches.
    let mut cache: FxHashMap<Arc<str>, Option<VeracityPrediction>> = FxHashMap::default();
    for node in query_graph.nodes() {
        let name = node.name.as_ref();
        if let Some(value) = snapshot.evidence_value(name) {
            answers.insert(name.to_string(), QueryAnswer::Evidence { value });
            continue;
        }
        let cached = match cache.get(&node.name) {
            Some(prediction) => prediction.clone(),
            None => {
                let prediction = predict_component(snapshot, &merged, name, strategy, config)?;
                for member in component_names(&merged, name) {
                    cache.insert(member, prediction.clone());
                }
                prediction
            }
        };
        let answer = match cached.and_then(|p| p.get(name)) {
            Some(value) => QueryAnswer::Predicted { value },
            None => QueryAnswer::NoEvidencePath,
        };
        answers.insert(name.to_string(), answer);
    }
    Ok(answers)
}

/// Runs the estimator on the component of `ego`; `None` if it holds no evidence.
fn predict_component(
    snapshot: &EvidenceSnapshot,
    merged: &TrustGraph,
    ego: &str,
    strategy: Strategy,
    config: &QueryConfig,
) -> Result<Option<VeracityPrediction>, CredenceError> {
    let ego_id = merged.node_id(ego).ok_or_else(|| {
        CredenceError::Internal(format!("ego '{}' missing from merged graph", ego))
    })?;
    let component = merged.induced_subgraph(&merged.component_of(ego_id))?;
    let evidence = snapshot.evidence_for(&component)?;
    if evidence.is_empty() {
        return Ok(None);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        ego,
        %strategy,
        component = component.len(),
        evidence = evidence.len(),
        "answering query"
    );

    let prediction = match strategy {
        Strategy::Katz => predict_veracity_truncated_katz(&component, &evidence, &config.katz)?,
        Strategy::CollectiveRegression => {
            predict_veracity_collective_regression(&component, &evidence, &config.propagation)?
        }
    };
    Ok(Some(prediction))
}

fn component_names(graph: &TrustGraph, name: &str) -> Vec<Arc<str>> {
    graph
        .node_id(name)
        .map(|id| {
            graph
                .component_of(id)
                .into_iter()
                .filter_map(|member| graph.node(member).map(|n| n.name.clone()))
                .collect()
        })
        .unwrap_or_default()
}
