//! CLI argument definitions using clap derive macros.
//!
//! Tunables are `Option`s so that a value from the config file can fill in
//! whatever the command line leaves unset; built-in defaults apply last.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use pubmed_export::AbandonPolicy;

/// Export PubMed titles and abstracts for a search query to CSV.
///
/// Searches PubMed through NCBI E-utilities, fetches the matching records in
/// paced batches (retrying transient failures) and writes one
/// `Title,Abstract` row per article. Missing fields are written as `NA`.
#[derive(Parser, Debug)]
#[command(name = "pubmed-export")]
#[command(author, version, about)]
pub struct Args {
    /// PubMed search query (Entrez syntax, passed through unchanged)
    pub query: String,

    /// Contact email sent to NCBI with every request
    #[arg(short, long, env = "ENTREZ_EMAIL")]
    pub email: Option<String>,

    /// NCBI API key
    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Maximum number of search results to export (default 10000)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub max_results: Option<u32>,

    /// Identifiers per fetch request (default 50)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub batch_size: Option<u32>,

    /// Seconds to wait before every fetch attempt, 0 to disable (default 10)
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub pace: Option<u64>,

    /// Maximum fetch attempts per batch, first attempt included (default 5)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub max_retries: Option<u32>,

    /// Output CSV path (default pubmed_articles.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// What abandoned batches contribute to the output (default fill)
    #[arg(long, value_enum)]
    pub on_abandon: Option<AbandonArg>,

    /// Config file (default $XDG_CONFIG_HOME/pubmed-export/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// E-utilities base URL
    #[arg(long, hide = true)]
    pub base_url: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Command-line spelling of [`AbandonPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AbandonArg {
    /// Write an `NA,NA` row for every identifier of an abandoned batch
    Fill,
    /// Write nothing for abandoned batches
    Omit,
}

impl From<AbandonArg> for AbandonPolicy {
    fn from(value: AbandonArg) -> Self {
        match value {
            AbandonArg::Fill => Self::FillSentinel,
            AbandonArg::Omit => Self::Omit,
        }
    }
}
