//! # GML loader
//!
//! Parses GML documents into a [`TrustGraph`] using the Pest parser
//! generator. The grammar lives in `grammar/gml.pest`.
//!
//! Parsing happens in two stages: the document is first read into a generic
//! [`GmlValue`] tree, then the `graph` list is interpreted:
//!
//! - `node [ id .. ]`: `id` identifies the node for edges; the display name is
//!   the first of [`GmlKeys::name_keys`] present, falling back to the id.
//! - Observation counts come from [`GmlKeys::true_count_keys`] and
//!   [`GmlKeys::false_count_keys`].
//! - `edge [ source .. target .. ]` references node ids.
//! - `directed` is ignored; every graph is read as undirected.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use rustc_hash::FxHashMap;

use crate::engine::errors::CredenceError;
use crate::engine::graph::{NodeId, ObservationCounts, TrustGraph};

#[derive(Parser)]
#[grammar = "../grammar/gml.pest"]
struct GmlParser;

/// A GML value.
#[derive(Debug, Clone, PartialEq)]
pub enum GmlValue {
    Integer(i64),
    Real(f64),
    Text(String),
    List(Vec<(String, GmlValue)>),
}

impl GmlValue {
    fn as_list(&self) -> Option<&[(String, GmlValue)]> {
        match self {
            GmlValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Scalar rendered as text; lists have no scalar form.
    fn as_scalar_text(&self) -> Option<String> {
        match self {
            GmlValue::Integer(v) => Some(v.to_string()),
            GmlValue::Real(v) => Some(v.to_string()),
            GmlValue::Text(s) => Some(s.clone()),
            GmlValue::List(_) => None,
        }
    }

    fn as_count(&self) -> Option<u64> {
        match self {
            GmlValue::Integer(v) => u64::try_from(*v).ok(),
            GmlValue::Real(v) if v.is_finite() && *v >= 0.0 && v.fract() == 0.0 => {
                Some(*v as u64)
            }
            _ => None,
        }
    }
}

/// Attribute names read from GML nodes, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmlKeys {
    pub name_keys: Vec<String>,
    pub true_count_keys: Vec<String>,
    pub false_count_keys: Vec<String>,
}

impl Default for GmlKeys {
    fn default() -> Self {
        Self {
            name_keys: vec!["name".into(), "label".into()],
            true_count_keys: vec!["truetweets".into(), "true_count".into()],
            false_count_keys: vec!["falsetweets".into(), "false_count".into()],
        }
    }
}

/// Parses a GML document into its top-level entries.
pub fn parse_gml_document(source: &str) -> Result<Vec<(String, GmlValue)>, CredenceError> {
    let mut pairs = GmlParser::parse(Rule::document, source)
        .map_err(|e| CredenceError::ParseError(e.to_string()))?;
    match pairs.next() {
        Some(document) => build_entries(document),
        None => Ok(Vec::new()),
    }
}

/// Parses a GML graph with the default attribute keys.
pub fn parse_gml(source: &str) -> Result<TrustGraph, CredenceError> {
    parse_gml_with_keys(source, &GmlKeys::default())
}

/// Parses a GML graph reading node attributes from `keys`.
pub fn parse_gml_with_keys(source: &str, keys: &GmlKeys) -> Result<TrustGraph, CredenceError> {
    let document = parse_gml_document(source)?;
    let items = document
        .iter()
        .find(|(key, _)| key == "graph")
        .and_then(|(_, value)| value.as_list())
        .ok_or_else(|| CredenceError::ParseError("gml: missing 'graph [ ... ]' block".into()))?;

    let mut graph = TrustGraph::new();
    let mut ids: FxHashMap<String, NodeId> = FxHashMap::default();

    for (key, value) in items {
        if key != "node" {
            continue;
        }
        let attrs = value
            .as_list()
            .ok_or_else(|| CredenceError::ParseError("gml: 'node' must be a list".into()))?;
        let id_text = lookup(attrs, "id")
            .and_then(GmlValue::as_scalar_text)
            .ok_or_else(|| CredenceError::ParseError("gml: node without scalar 'id'".into()))?;
        let name = keys
            .name_keys
            .iter()
            .find_map(|k| lookup(attrs, k).and_then(GmlValue::as_scalar_text))
            .unwrap_or_else(|| id_text.clone());
        let counts = ObservationCounts {
            true_count: read_count(attrs, &keys.true_count_keys, &name)?,
            false_count: read_count(attrs, &keys.false_count_keys, &name)?,
        };

        if ids.contains_key(&id_text) {
            return Err(CredenceError::ParseError(format!(
                "gml: duplicate node id {}",
                id_text
            )));
        }
        if graph.contains(&name) {
            return Err(CredenceError::ParseError(format!(
                "gml: duplicate node name '{}'",
                name
            )));
        }
        let node = graph.add_node(name, counts)?;
        ids.insert(id_text, node);
    }

    for (key, value) in items {
        if key != "edge" {
            continue;
        }
        let attrs = value
            .as_list()
            .ok_or_else(|| CredenceError::ParseError("gml: 'edge' must be a list".into()))?;
        let source = endpoint(attrs, "source", &ids)?;
        let target = endpoint(attrs, "target", &ids)?;
        graph.add_edge(source, target)?;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        "gml: parsed graph"
    );

    Ok(graph)
}

fn lookup<'a>(attrs: &'a [(String, GmlValue)], key: &str) -> Option<&'a GmlValue> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn read_count(
    attrs: &[(String, GmlValue)],
    keys: &[String],
    node: &str,
) -> Result<Option<u64>, CredenceError> {
    let Some(value) = keys.iter().find_map(|k| lookup(attrs, k)) else {
        return Ok(None);
    };
    value.as_count().map(Some).ok_or_else(|| {
        CredenceError::ParseError(format!(
            "gml: node '{}' has a count that is not a non-negative integer: {:?}",
            node, value
        ))
    })
}

fn endpoint(
    attrs: &[(String, GmlValue)],
    key: &str,
    ids: &FxHashMap<String, NodeId>,
) -> Result<NodeId, CredenceError> {
    let id = lookup(attrs, key)
        .and_then(GmlValue::as_scalar_text)
        .ok_or_else(|| CredenceError::ParseError(format!("gml: edge without '{}'", key)))?;
    ids.get(&id).copied().ok_or_else(|| {
        CredenceError::ParseError(format!("gml: edge {} references unknown node {}", key, id))
    })
}

fn build_entries(pair: Pair<Rule>) -> Result<Vec<(String, GmlValue)>, CredenceError> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::entry)
        .map(build_entry)
        .collect()
}

fn build_entry(pair: Pair<Rule>) -> Result<(String, GmlValue), CredenceError> {
    let mut inner = pair.into_inner();
    let key = inner
        .next()
        .ok_or_else(|| CredenceError::Internal("gml: entry without key".into()))?
        .as_str()
        .to_string();
    let value = inner
        .next()
        .ok_or_else(|| CredenceError::Internal(format!("gml: entry '{}' without value", key)))?;
    Ok((key, build_value(value)?))
}

fn build_value(pair: Pair<Rule>) -> Result<GmlValue, CredenceError> {
    match pair.as_rule() {
        Rule::list => Ok(GmlValue::List(build_entries(pair)?)),
        Rule::string => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(GmlValue::Text(decode_entities(raw)))
        }
        Rule::integer => pair
            .as_str()
            .parse::<i64>()
            .map(GmlValue::Integer)
            .map_err(|e| CredenceError::ParseError(format!("gml: integer '{}': {}", pair.as_str(), e))),
        Rule::real => pair
            .as_str()
            .parse::<f64>()
            .map(GmlValue::Real)
            .map_err(|e| CredenceError::ParseError(format!("gml: real '{}': {}", pair.as_str(), e))),
        other => Err(CredenceError::Internal(format!(
            "gml: unexpected rule {:?}",
            other
        ))),
    }
}

/// Decodes the XML character entities GML writers use inside strings.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "quot" => Some('"'),
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix('#')
                    .and_then(|code| match code.strip_prefix('x') {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => code.parse::<u32>().ok(),
                    })
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
