//! CLI entry point for the pubmed-export tool.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::Parser;
use pubmed_export::{AbandonPolicy, EntrezClient, RunReport, run};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::{load_file_config, resolve_run_settings};
use cli::Args;
use progress::BatchProgress;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(query = %args.query, "CLI arguments parsed");

    let loaded = load_file_config(args.config.as_deref())?;
    match (&loaded.config, &loaded.path) {
        (Some(_), Some(path)) => info!(path = %path.display(), "loaded config file"),
        (None, Some(path)) => debug!(path = %path.display(), "no config file found"),
        _ => {}
    }

    let settings = resolve_run_settings(&args, loaded.config.as_ref())?;
    debug!(pipeline = ?settings.pipeline, "resolved settings");

    let client = EntrezClient::new(settings.entrez)
        .context("Failed to create E-utilities client")?;

    let progress = BatchProgress::new(!args.quiet && io::stderr().is_terminal());
    let result = run(&client, &settings.pipeline, &progress).await;
    progress.finish();

    let report = result.with_context(|| format!("Export for query {:?} failed", args.query))?;
    print_summary(
        &report,
        settings.pipeline.abandon_policy,
        &settings.pipeline.output.display().to_string(),
        args.quiet,
    );

    Ok(())
}

fn print_summary(report: &RunReport, policy: AbandonPolicy, output: &str, quiet: bool) {
    info!(
        ids_found = report.ids_found,
        remote_count = report.remote_count,
        batches = report.batches_planned,
        fetched = report.batches_fetched,
        abandoned = report.abandoned.len(),
        attempts = report.total_attempts,
        rows = report.rows,
        "export complete"
    );

    if report.has_abandoned() {
        let indices: Vec<String> = report
            .abandoned
            .iter()
            .map(|batch| batch.index.to_string())
            .collect();
        match policy {
            AbandonPolicy::FillSentinel => {
                warn!(batches = %indices.join(","), "abandoned batches written as NA rows");
            }
            AbandonPolicy::Omit => {
                warn!(batches = %indices.join(","), "abandoned batches omitted from export");
            }
        }
    }

    if quiet {
        return;
    }

    if report.remote_count > report.ids_found as u64 {
        println!(
            "{} articles matched; exported the first {}",
            report.remote_count, report.ids_found
        );
    }
    println!(
        "Found {} identifiers, wrote {} rows to {}",
        report.ids_found, report.rows, output
    );
    if report.has_abandoned() {
        let fate = match policy {
            AbandonPolicy::FillSentinel => "written as NA",
            AbandonPolicy::Omit => "omitted",
        };
        println!(
            "{} of {} batches were abandoned after repeated failures; their rows were {}",
            report.abandoned.len(),
            report.batches_planned,
            fate
        );
    }
}
