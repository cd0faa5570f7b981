//! Loading GML and JSON graph documents from disk.

use std::path::PathBuf;

use credence_core::storage::json::to_json_string;
use credence_core::storage::{load_graph, parse_gml};
use credence_core::{
    predict_veracity_truncated_katz, CredenceError, EvidenceSelection, EvidenceSet, KatzConfig,
};

const RETWEETS: &str = r#"
graph [
  directed 0
  node [ id 0 label "@newsdesk" truetweets 12 falsetweets 1 ]
  node [ id 1 label "@casual" truetweets 1 falsetweets 0 ]
  node [ id 2 label "@rumourmill" truetweets 0 falsetweets 9 ]
  node [ id 3 label "@lurker" ]
  edge [ source 0 target 1 ]
  edge [ source 1 target 2 ]
  edge [ source 1 target 3 ]
]
"#;

fn temp_path(file: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("credence-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(file)
}

#[test]
fn gml_export_feeds_katz_end_to_end() {
    let path = temp_path("retweets.gml");
    std::fs::write(&path, RETWEETS).unwrap();

    let graph = load_graph(&path).unwrap();
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.edge_count(), 3);

    let evidence = EvidenceSet::from_priors(&graph, &EvidenceSelection::default()).unwrap();
    assert_eq!(evidence.len(), 2);

    let prediction = predict_veracity_truncated_katz(&graph, &evidence, &KatzConfig::default()).unwrap();
    let names: Vec<&str> = prediction.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["@casual", "@lurker"]);
    let casual = prediction.get("@casual").unwrap();
    // Equidistant from both evidence nodes, so the mean of their priors.
    assert!((casual - (13.0 / 15.0 + 1.0 / 11.0) / 2.0).abs() < 1e-12);
}

#[test]
fn json_document_written_from_gml_loads_identically() {
    let graph = parse_gml(RETWEETS).unwrap();
    let path = temp_path("retweets.json");
    std::fs::write(&path, to_json_string(&graph).unwrap()).unwrap();

    let loaded = load_graph(&path).unwrap();
    assert_eq!(loaded.nodes(), graph.nodes());
    assert_eq!(loaded.edges().collect::<Vec<_>>(), graph.edges().collect::<Vec<_>>());
}

#[test]
fn unsupported_extension_and_missing_file_are_errors() {
    assert!(matches!(
        load_graph("graph.csv"),
        Err(CredenceError::ValidationError(_))
    ));
    assert!(matches!(
        load_graph(temp_path("absent.gml")),
        Err(CredenceError::Io(_))
    ));
}
