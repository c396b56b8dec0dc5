mod config;
mod serve;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tally_core::{
    structural_hash, validate_answers, AnswerDomain, AnswersPayload, EngineError,
};
use tally_eval::{prepare, Prepared, ScoringEngine};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Deterministic scoring engine.
#[derive(Parser)]
#[command(name = "tally", version, about = "Deterministic scoring engine")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scoring bundle against the JSON Schema and the engine rules
    Validate {
        /// Path to the bundle JSON file
        bundle: PathBuf,
    },

    /// Print the dependency graph of a bundle
    Graph {
        /// Path to the bundle JSON file
        bundle: PathBuf,
    },

    /// Print the version hash of a bundle
    Hash {
        /// Path to the bundle JSON file
        bundle: PathBuf,
        /// Hash the variables only, ignoring version_id and metadata
        #[arg(long)]
        structural: bool,
    },

    /// Score an answers payload against a bundle
    Score {
        /// Path to the bundle JSON file
        bundle: PathBuf,
        /// Path to the answers payload JSON file
        #[arg(long)]
        answers: PathBuf,
    },

    /// Start the Tally HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
        /// Bundle JSON files to upload at startup
        #[arg()]
        bundles: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&format!("error: {}", msg), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Validate { bundle } => {
            cmd_validate(&bundle, &config.answers, cli.output, cli.quiet);
        }
        Commands::Graph { bundle } => {
            cmd_graph(&bundle, &config.answers, cli.output, cli.quiet);
        }
        Commands::Hash { bundle, structural } => {
            cmd_hash(&bundle, structural, &config.answers, cli.output, cli.quiet);
        }
        Commands::Score { bundle, answers } => {
            cmd_score(&bundle, &answers, &config.answers, cli.output, cli.quiet);
        }
        Commands::Serve { port, bundles } => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {}", e);
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(port, bundles, config)) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
    }
}

/// Read and parse a JSON file, exiting with a report on failure.
fn read_json(path: &Path, what: &str, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let src = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading {} '{}': {}", what, path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&src) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Print an engine error payload and exit.
///
/// The tagged JSON payload is printed in both output modes; `--quiet` only
/// silences it in text mode.
fn exit_with_engine_error(err: &EngineError, output: OutputFormat, quiet: bool) -> ! {
    let err_json = serde_json::to_string_pretty(&err.to_json_value())
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err.code()));
    match output {
        OutputFormat::Json => eprintln!("{}", err_json),
        OutputFormat::Text => {
            if !quiet {
                eprintln!("{}", err);
                eprintln!("{}", err_json);
            }
        }
    }
    process::exit(1);
}

fn prepare_or_exit(
    bundle_path: &Path,
    domain: &AnswerDomain,
    output: OutputFormat,
    quiet: bool,
) -> Prepared {
    let raw = read_json(bundle_path, "bundle", output, quiet);
    match prepare(&raw, domain) {
        Ok(p) => p,
        Err(e) => exit_with_engine_error(&e, output, quiet),
    }
}

fn print_json(value: &impl serde::Serialize) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

static BUNDLE_SCHEMA_STR: &str = include_str!("../../../schema/bundle-schema.json");

fn cmd_validate(bundle_path: &Path, domain: &AnswerDomain, output: OutputFormat, quiet: bool) {
    let schema: serde_json::Value = match serde_json::from_str(BUNDLE_SCHEMA_STR) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("internal error: failed to parse embedded bundle schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("internal error: failed to compile schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let doc = read_json(bundle_path, "bundle", output, quiet);

    // Schema first: it reports every violation, the engine only the first.
    let errors: Vec<String> = validator
        .iter_errors(&doc)
        .map(|e| format!("{}", e))
        .collect();
    if !errors.is_empty() {
        match output {
            OutputFormat::Text => {
                if !quiet {
                    eprintln!("invalid bundle");
                    for err in &errors {
                        eprintln!("  - {}", err);
                    }
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({ "valid": false, "errors": errors });
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&json).unwrap_or_default()
                );
            }
        }
        process::exit(1);
    }

    let prepared = match prepare(&doc, domain) {
        Ok(p) => p,
        Err(e) => exit_with_engine_error(&e, output, quiet),
    };

    if !quiet {
        match output {
            OutputFormat::Text => println!(
                "valid: {} ({} variables, {})",
                prepared.bundle.version_id,
                prepared.bundle.variables.len(),
                prepared.version_hash
            ),
            OutputFormat::Json => print_json(&serde_json::json!({
                "valid": true,
                "version_id": prepared.bundle.version_id,
                "version_hash": prepared.version_hash,
            })),
        }
    }
}

fn cmd_graph(bundle_path: &Path, domain: &AnswerDomain, output: OutputFormat, quiet: bool) {
    let prepared = prepare_or_exit(bundle_path, domain, output, quiet);
    let graph = &prepared.graph;
    match output {
        OutputFormat::Json => print_json(graph),
        OutputFormat::Text => {
            println!("order: {}", graph.topo_order.join(", "));
            for (depth, layer) in graph.layers.iter().enumerate() {
                println!("layer {}: {}", depth, layer.join(", "));
            }
            for edge in &graph.edges {
                println!("{} -> {}", edge.from, edge.to);
            }
        }
    }
}

fn cmd_hash(
    bundle_path: &Path,
    structural: bool,
    domain: &AnswerDomain,
    output: OutputFormat,
    quiet: bool,
) {
    let prepared = prepare_or_exit(bundle_path, domain, output, quiet);
    let (key, hash) = if structural {
        ("structural_hash", structural_hash(&prepared.bundle))
    } else {
        ("version_hash", prepared.version_hash)
    };
    match output {
        OutputFormat::Text => println!("{}", hash),
        OutputFormat::Json => print_json(&serde_json::json!({ key: hash })),
    }
}

fn cmd_score(
    bundle_path: &Path,
    answers_path: &Path,
    domain: &AnswerDomain,
    output: OutputFormat,
    quiet: bool,
) {
    let prepared = prepare_or_exit(bundle_path, domain, output, quiet);

    let raw_answers = read_json(answers_path, "answers", output, quiet);
    let payload: AnswersPayload = match serde_json::from_value(raw_answers) {
        Ok(p) => p,
        Err(e) => {
            let msg = format!(
                "error: invalid answers payload in '{}': {}",
                answers_path.display(),
                e
            );
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    if let Err(e) = validate_answers(&payload.answers, domain) {
        exit_with_engine_error(&e, output, quiet);
    }

    let result = match ScoringEngine::from_prepared(prepared).run(&payload) {
        Ok(r) => r,
        Err(e) => exit_with_engine_error(&e, output, quiet),
    };

    match output {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Text => {
            for var_id in &result.execution_trace {
                if let Some(value) = result.variables.get(var_id) {
                    println!("{} = {}", var_id, value);
                }
            }
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
