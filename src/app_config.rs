//! Application configuration loading and merging for CLI runs.
//!
//! Precedence for every setting: command-line flag (or its environment
//! variable) > config file > built-in default.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use pubmed_export::client::{DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use pubmed_export::{AbandonPolicy, EntrezConfig, PipelineConfig};

use crate::cli::Args;

const CONFIG_DIR: &str = "pubmed-export";
const CONFIG_FILE: &str = "config.toml";

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Contact email sent to NCBI.
    pub email: Option<String>,
    /// NCBI API key.
    pub api_key: Option<String>,
    /// Maximum number of search results.
    pub max_results: Option<u32>,
    /// Identifiers per fetch request.
    pub batch_size: Option<u32>,
    /// Pacing wait before each fetch attempt, in seconds.
    pub pace_secs: Option<u64>,
    /// Maximum fetch attempts per batch.
    pub max_retries: Option<u32>,
    /// Output CSV path.
    pub output: Option<PathBuf>,
    /// Abandoned-batch policy.
    pub on_abandon: Option<AbandonSetting>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// E-utilities base URL.
    pub base_url: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("max_results", self.max_results.map(u64::from), 1, 10_000)?;
        validate_range("batch_size", self.batch_size.map(u64::from), 1, 10_000)?;
        validate_range("pace_secs", self.pace_secs, 0, 3600)?;
        validate_range("max_retries", self.max_retries.map(u64::from), 1, 100)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;

        if let Some(email) = &self.email
            && email.trim().is_empty()
        {
            bail!("Invalid config value for `email`: must not be empty");
        }
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Config-file spelling of [`AbandonPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbandonSetting {
    Fill,
    Omit,
}

impl From<AbandonSetting> for AbandonPolicy {
    fn from(value: AbandonSetting) -> Self {
        match value {
            AbandonSetting::Fill => Self::FillSentinel,
            AbandonSetting::Omit => Self::Omit,
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Config path that was considered, if any.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/pubmed-export/config.toml`
/// 2. `$HOME/.config/pubmed-export/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(CONFIG_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit config file, or the default one if it exists.
///
/// An explicit path must exist; a missing default file is not an error.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = read_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(read_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Remote client settings.
    pub entrez: EntrezConfig,
    /// Pipeline settings.
    pub pipeline: PipelineConfig,
}

/// Merges CLI arguments over the file config over built-in defaults.
pub fn resolve_run_settings(args: &Args, file: Option<&FileConfig>) -> Result<RunSettings> {
    let empty = FileConfig::default();
    let file = file.unwrap_or(&empty);

    let email = args
        .email
        .clone()
        .or_else(|| file.email.clone())
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());
    let Some(email) = email else {
        bail!(
            "A contact email is required by NCBI: pass --email, set ENTREZ_EMAIL, \
             or add `email` to the config file"
        );
    };

    let connect_timeout = file
        .connect_timeout_secs
        .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs);
    let read_timeout = file
        .read_timeout_secs
        .map_or(DEFAULT_READ_TIMEOUT, Duration::from_secs);
    let base_url = args
        .base_url
        .clone()
        .or_else(|| file.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let entrez = EntrezConfig::new(email)
        .with_api_key(args.api_key.clone().or_else(|| file.api_key.clone()))
        .with_base_url(base_url)
        .with_timeouts(connect_timeout, read_timeout);

    let mut pipeline = PipelineConfig::new(args.query.clone());
    if let Some(max_results) = args.max_results.or(file.max_results) {
        pipeline.max_results = usize::try_from(max_results)?;
    }
    if let Some(batch_size) = args.batch_size.or(file.batch_size) {
        pipeline.batch_size = usize::try_from(batch_size)?;
    }
    if let Some(pace) = args.pace.or(file.pace_secs) {
        pipeline.pace = Duration::from_secs(pace);
    }
    if let Some(max_retries) = args.max_retries.or(file.max_retries) {
        pipeline.max_attempts = max_retries;
    }
    if let Some(output) = args.output.clone().or_else(|| file.output.clone()) {
        pipeline.output = output;
    }
    if let Some(policy) = args
        .on_abandon
        .map(AbandonPolicy::from)
        .or_else(|| file.on_abandon.map(AbandonPolicy::from))
    {
        pipeline.abandon_policy = policy;
    }

    Ok(RunSettings { entrez, pipeline })
}
