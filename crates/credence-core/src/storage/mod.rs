//! Graph persistence.
//!
//! Graphs are read from GML (the format social-graph exports usually come in)
//! or from a JSON [`json::GraphDocument`]. [`load_graph`] picks the format
//! from the file extension.

pub mod gml;
#[cfg(feature = "serde")]
pub mod json;

use std::path::Path;

use crate::engine::errors::CredenceError;
use crate::engine::graph::TrustGraph;

pub use gml::{parse_gml, parse_gml_with_keys, GmlKeys};

/// Reads a graph from a `.gml` or `.json` file.
pub fn load_graph(path: impl AsRef<Path>) -> Result<TrustGraph, CredenceError> {
    load_graph_with_keys(path, &GmlKeys::default())
}

/// Like [`load_graph`], reading GML node attributes from `keys`.
pub fn load_graph_with_keys(
    path: impl AsRef<Path>,
    keys: &GmlKeys,
) -> Result<TrustGraph, CredenceError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), "loading graph");

    match extension.as_str() {
        "gml" => parse_gml_with_keys(&std::fs::read_to_string(path)?, keys),
        #[cfg(feature = "serde")]
        "json" => json::parse_json_graph(&std::fs::read_to_string(path)?),
        _ => Err(CredenceError::ValidationError(format!(
            "unsupported graph format '{}' (expected .gml or .json)",
            path.display()
        ))),
    }
}
