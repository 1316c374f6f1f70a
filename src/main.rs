//! tsquery - analyzes JSON encoded queries, one per line

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tsquery::{AnalysisRequest, AnalyzerConfig, QueryAnalyzer};

/// Resolves time ranges and referenced columns of parsed queries
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File with one JSON query per line (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Print Prometheus metrics to stderr on exit
    #[arg(short, long)]
    metrics: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        .init();

    let metrics_handle = if args.metrics {
        Some(tsquery::metrics::init_metrics().context("Failed to install metrics recorder")?)
    } else {
        None
    };

    let config = match &args.config {
        Some(path) => AnalyzerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    let analyzer = QueryAnalyzer::with_config(config);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut analyzed = 0usize;
    let mut failed = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<AnalysisRequest>(&line) {
            Ok(mut request) => match analyzer.analyze(&mut request) {
                Ok(analysis) => {
                    analyzed += 1;
                    json!({ "ok": analysis })
                }
                Err(e) => {
                    failed += 1;
                    json!({ "error": { "kind": e.kind(), "message": e.to_string() } })
                }
            },
            Err(e) => {
                failed += 1;
                warn!(line = line_no + 1, "Malformed query: {}", e);
                json!({ "error": { "kind": "malformed_query", "message": e.to_string() } })
            }
        };
        writeln!(out, "{}", response).context("Failed to write output")?;
    }

    info!(analyzed, failed, "Finished analyzing queries");

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }
    Ok(())
}
