//! NCBI E-utilities implementation of [`LiteratureApi`].
//!
//! - `search` calls `esearch.fcgi` with `retmode=json`
//! - `fetch` calls `efetch.fcgi` with `rettype=abstract&retmode=xml`; lists
//!   longer than [`EFETCH_POST_THRESHOLD`] identifiers go in a form-encoded
//!   POST body instead of the query string
//!
//! Every request carries the caller identity (`tool`, `email`) and the
//! optional `api_key` from the [`EntrezConfig`] the client was built with.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::pipeline::{FailureType, classify_http_status};
use crate::record::{Record, RecordError, parse_article_set};
use crate::user_agent::TOOL_NAME;

use super::http_client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, build_http_client};
use super::{ApiError, LiteratureApi, SearchResult};

/// Default E-utilities base URL.
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/";

const DATABASE: &str = "pubmed";
const ESEARCH: &str = "esearch.fcgi";
const EFETCH: &str = "efetch.fcgi";

/// Identifier count above which efetch switches from GET to POST.
pub const EFETCH_POST_THRESHOLD: usize = 200;

/// Longest body excerpt quoted in error messages.
const BODY_EXCERPT_CHARS: usize = 200;

/// Caller identity and connection settings for [`EntrezClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrezConfig {
    /// Contact email sent with every request.
    pub email: String,
    /// Optional NCBI API key (raises the service's request allowance).
    pub api_key: Option<String>,
    /// Tool name sent with every request.
    pub tool: String,
    /// E-utilities base URL.
    pub base_url: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
}

impl EntrezConfig {
    /// Creates a configuration for the given contact email with defaults
    /// for everything else.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_key: None,
            tool: TOOL_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    /// Overrides the base URL (tests point this at a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides connect and read timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect_timeout: Duration, read_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.read_timeout = read_timeout;
        self
    }
}

/// E-utilities client for the `pubmed` database.
pub struct EntrezClient {
    client: Client,
    config: EntrezConfig,
    esearch_url: Url,
    efetch_url: Url,
}

impl std::fmt::Debug for EntrezClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntrezClient")
            .field("base_url", &self.config.base_url)
            .field("email", &self.config.email)
            .field("api_key", &self.config.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Which remote operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Search,
    Fetch,
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

impl EntrezClient {
    /// Creates a client from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the base URL is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(config: EntrezConfig) -> Result<Self, ApiError> {
        let base = parse_base_url(&config.base_url)?;
        let esearch_url = join_endpoint(&base, ESEARCH)?;
        let efetch_url = join_endpoint(&base, EFETCH)?;
        let client = build_http_client(config.connect_timeout, config.read_timeout)?;

        debug!(base_url = %base, tool = %config.tool, "creating E-utilities client");

        Ok(Self {
            client,
            config,
            esearch_url,
            efetch_url,
        })
    }

    /// Returns the configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &EntrezConfig {
        &self.config
    }

    fn request_url(&self, operation: Operation, params: &[(&str, &str)]) -> Url {
        let mut url = match operation {
            Operation::Search => self.esearch_url.clone(),
            Operation::Fetch => self.efetch_url.clone(),
        };
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("db", DATABASE);
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("tool", &self.config.tool);
            pairs.append_pair("email", &self.config.email);
            if let Some(api_key) = &self.config.api_key {
                pairs.append_pair("api_key", api_key);
            }
        }
        url
    }

    /// GET request with the parameters in the query string.
    fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// POST request with the query string moved into a form body.
    fn post_form(&self, mut url: Url) -> RequestBuilder {
        let form = url.query().unwrap_or_default().to_string();
        url.set_query(None);
        self.client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
    }

    /// Sends the request and returns the status with the full body.
    async fn send(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<(StatusCode, String), ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(endpoint, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::transient(endpoint, format!("reading body: {e}")))?;
        Ok((status, body))
    }
}

/// Maps a non-success status to the matching [`ApiError`].
fn check_status(endpoint: &str, status: StatusCode, body: &str) -> Result<(), ApiError> {
    match classify_http_status(status.as_u16()) {
        None => Ok(()),
        Some(_) if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
            Err(ApiError::unauthorized(endpoint, status.as_u16()))
        }
        Some(FailureType::Transient) => Err(ApiError::transient_status(endpoint, status.as_u16())),
        Some(FailureType::Permanent) => Err(ApiError::invalid_request(
            endpoint,
            format!("HTTP {}: {}", status.as_u16(), excerpt(body)),
        )),
    }
}

#[async_trait]
impl LiteratureApi for EntrezClient {
    #[instrument(skip(self), fields(endpoint = ESEARCH))]
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResult, ApiError> {
        let retmax = max_results.to_string();
        let url = self.request_url(
            Operation::Search,
            &[("term", query), ("retmax", retmax.as_str()), ("retmode", "json")],
        );
        let endpoint = endpoint_label(&url);

        let (status, body) = self.send(self.get(url), &endpoint).await?;
        if status == StatusCode::BAD_REQUEST {
            return Err(ApiError::invalid_query(
                query,
                format!("HTTP 400: {}", excerpt(&body)),
            ));
        }
        check_status(&endpoint, status, &body)?;

        let mut result = decode_search(&endpoint, query, &body)?;
        result.ids.truncate(max_results);

        debug!(count = result.count, ids = result.ids.len(), "search completed");
        Ok(result)
    }

    #[instrument(skip(self, ids), fields(endpoint = EFETCH, ids = ids.len()))]
    async fn fetch(&self, ids: &[String]) -> Result<Vec<Record>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids.join(",");
        let url = self.request_url(
            Operation::Fetch,
            &[("id", id_list.as_str()), ("rettype", "abstract"), ("retmode", "xml")],
        );
        let endpoint = endpoint_label(&url);

        let request = if ids.len() > EFETCH_POST_THRESHOLD {
            debug!(ids = ids.len(), "sending efetch as POST");
            self.post_form(url)
        } else {
            self.get(url)
        };
        let (status, body) = self.send(request, &endpoint).await?;
        check_status(&endpoint, status, &body)?;
        let records = parse_article_set(&body).map_err(|error| match error {
            RecordError::Service { message } => ApiError::invalid_request(&endpoint, message),
            other => ApiError::malformed(&endpoint, other.to_string()),
        })?;

        debug!(records = records.len(), "fetch completed");
        Ok(records)
    }
}

fn decode_search(endpoint: &str, query: &str, body: &str) -> Result<SearchResult, ApiError> {
    let response: ESearchResponse =
        serde_json::from_str(body).map_err(|e| ApiError::malformed(endpoint, e.to_string()))?;
    let result = response.esearchresult;

    if let Some(message) = result.error {
        return Err(ApiError::invalid_query(query, message));
    }

    let count = result
        .count
        .as_deref()
        .ok_or_else(|| ApiError::malformed(endpoint, "esearch result has no count"))?
        .trim()
        .parse::<u64>()
        .map_err(|e| ApiError::malformed(endpoint, format!("invalid count: {e}")))?;

    Ok(SearchResult {
        count,
        ids: result.idlist,
    })
}

fn parse_base_url(base_url: &str) -> Result<Url, ApiError> {
    let mut base = Url::parse(base_url).map_err(|e| ApiError::Client {
        message: format!("invalid base URL {base_url:?}: {e}"),
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn join_endpoint(base: &Url, name: &str) -> Result<Url, ApiError> {
    base.join(name).map_err(|e| ApiError::Client {
        message: format!("invalid endpoint {name}: {e}"),
    })
}

/// Endpoint without query string, safe to log (no email or API key).
fn endpoint_label(url: &Url) -> String {
    let mut label = url.clone();
    label.set_query(None);
    label.to_string()
}

fn map_reqwest_error(endpoint: &str, error: &reqwest::Error) -> ApiError {
    if error.is_builder() {
        return ApiError::invalid_request(endpoint, error.to_string());
    }
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    ApiError::transient(endpoint, format!("{kind}: {error}"))
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    format!("{cut}...")
}
