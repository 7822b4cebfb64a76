//! HTTP client construction for E-utilities requests.
//!
//! One `reqwest::Client` is built per [`EntrezClient`](super::EntrezClient)
//! with the configured connect/read timeouts, gzip and the project
//! User-Agent. Per-call timeouts live here; the pipeline only bounds
//! attempts.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use crate::user_agent;

use super::ApiError;

/// Default connect timeout for E-utilities requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout for E-utilities requests (efetch bodies can be large).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the HTTP client used for all E-utilities calls.
///
/// Some sandboxed environments panic while querying system proxy settings;
/// in that case the client is rebuilt with proxy settings taken from the
/// environment only.
///
/// # Errors
///
/// Returns [`ApiError::Client`] when client construction fails.
pub fn build_http_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, ApiError> {
    match try_build(connect_timeout, read_timeout, false) {
        Ok(client) => Ok(client),
        Err(BuildFailure::Panic) => {
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            try_build(connect_timeout, read_timeout, true).map_err(BuildFailure::into_api_error)
        }
        Err(failure) => Err(failure.into_api_error()),
    }
}

enum BuildFailure {
    Panic,
    Build(reqwest::Error),
}

impl BuildFailure {
    fn into_api_error(self) -> ApiError {
        let message = match self {
            Self::Panic => "client construction panicked while reading proxy settings".to_string(),
            Self::Build(error) => error.to_string(),
        };
        ApiError::Client { message }
    }
}

fn try_build(
    connect_timeout: Duration,
    read_timeout: Duration,
    env_proxy_only: bool,
) -> Result<Client, BuildFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(connect_timeout, read_timeout);
        if env_proxy_only {
            builder = apply_env_proxy(builder.no_proxy());
        }
        builder.build().map_err(BuildFailure::Build)
    }))
    .map_err(|_| BuildFailure::Panic)?
}

fn base_builder(connect_timeout: Duration, read_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(read_timeout)
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
}

fn apply_env_proxy(mut builder: ClientBuilder) -> ClientBuilder {
    let https = first_env(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = https
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    let http = first_env(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]);
    if let Some(proxy) = http
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
