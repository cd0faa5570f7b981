//! JSON graph documents.
//!
//! ```json
//! {
//!   "nodes": [{ "name": "alice", "true_count": 4, "false_count": 1 }, { "name": "bob" }],
//!   "edges": [["alice", "bob"]]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::errors::CredenceError;
use crate::engine::graph::{ObservationCounts, TrustGraph};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_count: Option<u64>,
}

/// Serialized form of a [`TrustGraph`]; edges reference node names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
}

impl GraphDocument {
    pub fn from_graph(graph: &TrustGraph) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|node| NodeRecord {
                name: node.name.to_string(),
                true_count: node.counts.true_count,
                false_count: node.counts.false_count,
            })
            .collect();
        let edges = graph
            .edges()
            .filter_map(|(a, b)| Some((graph.node(a)?.name.to_string(), graph.node(b)?.name.to_string())))
            .collect();
        Self { nodes, edges }
    }

    pub fn into_graph(self) -> Result<TrustGraph, CredenceError> {
        let mut graph = TrustGraph::new();
        for record in self.nodes {
            if graph.contains(&record.name) {
                return Err(CredenceError::ParseError(format!(
                    "json: duplicate node name '{}'",
                    record.name
                )));
            }
            graph.add_node(
                record.name,
                ObservationCounts {
                    true_count: record.true_count,
                    false_count: record.false_count,
                },
            )?;
        }
        for (a, b) in &self.edges {
            let (Some(a_id), Some(b_id)) = (graph.node_id(a), graph.node_id(b)) else {
                return Err(CredenceError::ParseError(format!(
                    "json: edge ({}, {}) references an unknown node",
                    a, b
                )));
            };
            graph.add_edge(a_id, b_id)?;
        }
        Ok(graph)
    }
}

/// Parses a JSON [`GraphDocument`] into a graph.
pub fn parse_json_graph(source: &str) -> Result<TrustGraph, CredenceError> {
    let document: GraphDocument = serde_json::from_str(source)?;
    document.into_graph()
}

/// Serializes a graph as a pretty-printed JSON [`GraphDocument`].
pub fn to_json_string(graph: &TrustGraph) -> Result<String, CredenceError> {
    Ok(serde_json::to_string_pretty(&GraphDocument::from_graph(graph))?)
}
