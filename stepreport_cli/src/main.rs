//! Standalone reporter binary.
//!
//! Usage:
//!   cargo run -p stepreport_cli -- [--config stepreport.json] [--metadata test-metadata.json]
//!       [--results-dir test-results/screenshots] [--natural-sort] worker-1.jsonl worker-2.jsonl
//!
//! Each log holds one JSON lifecycle event per line (`begin`, `testBegin`,
//! `stepEnd`, `end`). All logs are replayed into one reporter and the HTML
//! report is written next to the screenshots.

use std::sync::Arc;

use anyhow::Context;
use stepreport_cli::{args::USAGE, replay, CliArgs};
use stepreport_shared::collector::StepCollector;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let cfg = args.resolve_config().context("load reporter config")?;
    info!(results = %cfg.results_dir, metadata = %cfg.metadata_path, logs = args.logs.len(), "Starting reporter");

    let collector = Arc::new(StepCollector::new(cfg));
    let summary = replay(collector.clone(), args.logs).await?;

    match collector.finish(&summary.result) {
        Ok(outcome) => {
            println!("Report:  {}", outcome.html_path.display());
            if let Some(json) = &outcome.json_path {
                println!("Summary: {}", json.display());
            }
            println!(
                "Steps: {} passed, {} failed, {} skipped ({:.1}% pass rate)",
                outcome.stats.passed,
                outcome.stats.failed,
                outcome.stats.skipped,
                outcome.stats.pass_rate()
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to write test report");
            std::process::exit(1);
        }
    }
}
