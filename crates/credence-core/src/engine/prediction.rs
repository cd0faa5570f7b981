//! Name-keyed veracity results returned by the estimators.

use std::collections::BTreeMap;

use crate::engine::errors::CredenceError;
use crate::engine::graph::{NodeId, TrustGraph};

/// Predicted veracity per node display name.
///
/// Only non-evidence nodes appear; evidence values are inputs, never
/// predictions. Ordered by name for deterministic output.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct VeracityPrediction {
    values: BTreeMap<String, f64>,
}

impl VeracityPrediction {
    /// Resolves node indices to names in `graph`.
    pub fn from_indexed(
        graph: &TrustGraph,
        pairs: impl IntoIterator<Item = (NodeId, f64)>,
    ) -> Result<Self, CredenceError> {
        let mut values = BTreeMap::new();
        for (id, value) in pairs {
            let node = graph.node(id).ok_or_else(|| {
                CredenceError::Internal(format!(
                    "prediction for node {:?} outside graph of {} nodes",
                    id,
                    graph.len()
                ))
            })?;
            values.insert(node.name.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
