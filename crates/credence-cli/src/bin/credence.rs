//! Credence CLI - veracity prediction over social graphs
//!
//! Usage:
//!   credence predict <GRAPH>                                   # Katz prediction for every unknown node
//!   credence predict <GRAPH> --strategy cr --alpha 0.9         # Collective regression
//!   credence query --evidence <GRAPH> --query <GRAPH> --ego N  # Answer for one ego node

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use credence_core::{
    answer_query, load_graph, predict_veracity_collective_regression,
    predict_veracity_truncated_katz, CredenceError, EvidenceSelection, EvidenceSet,
    EvidenceSnapshot, KatzConfig, PropagationConfig, QueryConfig, Strategy,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "credence")]
#[command(version)]
#[command(about = "Credence - veracity prediction over social graphs")]
#[command(long_about = "Estimate node veracity from a sparse set of known nodes using truncated Katz similarity or collective regression")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict veracity for every non-evidence node of a graph
    Predict(PredictArgs),
    /// Answer a query sub-graph for one ego node against an evidence graph
    Query(QueryArgs),
}

#[derive(Args)]
struct PredictArgs {
    /// Input graph (.gml or .json)
    #[arg(value_name = "GRAPH")]
    graph: PathBuf,

    /// Estimator: katz or cr
    #[arg(short, long, default_value = "katz", value_parser = parse_strategy)]
    strategy: Strategy,

    #[command(flatten)]
    estimator: EstimatorArgs,
}

#[derive(Args)]
struct QueryArgs {
    /// Evidence graph (.gml or .json)
    #[arg(long, value_name = "GRAPH")]
    evidence: PathBuf,

    /// Query sub-graph (.gml or .json)
    #[arg(long, value_name = "GRAPH")]
    query: PathBuf,

    /// Name of the node to answer for
    #[arg(long, value_name = "NAME")]
    ego: String,

    /// Estimator: katz or cr
    #[arg(short, long, default_value = "katz", value_parser = parse_strategy)]
    strategy: Strategy,

    #[command(flatten)]
    estimator: EstimatorArgs,
}

#[derive(Args)]
struct EstimatorArgs {
    /// Trust/decay factor (default 0.75 for katz; 1.0 for predict cr, 0.9 for query cr)
    #[arg(long)]
    alpha: Option<f64>,

    /// Initial gradient step for cr
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Iteration cap for cr
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Seed for the cr initial vector
    #[arg(long)]
    seed: Option<u64>,

    /// Observations a node needs to count as evidence
    #[arg(long, default_value_t = EvidenceSelection::default().min_observations)]
    min_observations: u64,
}

impl EstimatorArgs {
    fn selection(&self) -> EvidenceSelection {
        EvidenceSelection {
            min_observations: self.min_observations,
        }
    }

    fn katz(&self) -> KatzConfig {
        let mut config = KatzConfig::default();
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        config
    }

    fn propagation(&self, mut config: PropagationConfig) -> PropagationConfig {
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(rate) = self.learning_rate {
            config.learning_rate = rate;
        }
        if let Some(cap) = self.max_iterations {
            config.max_iterations = cap;
        }
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }
        config
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse().map_err(|e: CredenceError| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Command::Predict(args) => run_predict(args),
        Command::Query(args) => run_query(args),
    };

    match result {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_predict(args: &PredictArgs) -> Result<String, CredenceError> {
    let graph = load_graph(&args.graph)?;
    let evidence = EvidenceSet::from_priors(&graph, &args.estimator.selection())?;
    tracing::info!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        evidence = evidence.len(),
        strategy = %args.strategy,
        "loaded graph"
    );

    let prediction = match args.strategy {
        Strategy::Katz => {
            predict_veracity_truncated_katz(&graph, &evidence, &args.estimator.katz())?
        }
        Strategy::CollectiveRegression => predict_veracity_collective_regression(
            &graph,
            &evidence,
            &args.estimator.propagation(PropagationConfig::default()),
        )?,
    };
    Ok(serde_json::to_string_pretty(&prediction)?)
}

fn run_query(args: &QueryArgs) -> Result<String, CredenceError> {
    let snapshot = EvidenceSnapshot::new(load_graph(&args.evidence)?, &args.estimator.selection())?;
    let query_graph = load_graph(&args.query)?;

    let defaults = QueryConfig::default();
    let config = QueryConfig {
        katz: args.estimator.katz(),
        propagation: args.estimator.propagation(defaults.propagation),
    };
    let answer = answer_query(&snapshot, &query_graph, &args.ego, args.strategy, &config)?;
    Ok(serde_json::to_string_pretty(&answer)?)
}
