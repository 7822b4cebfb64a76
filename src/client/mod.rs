//! Remote search/fetch API client.
//!
//! The pipeline talks to the remote service only through the
//! [`LiteratureApi`] trait: one `search` call turning a query into an ordered
//! identifier list, and `fetch` calls turning identifier batches into
//! [`Record`]s. [`EntrezClient`] implements it against NCBI E-utilities;
//! tests substitute scripted implementations.
//!
//! # Example
//!
//! ```no_run
//! use pubmed_export::client::{EntrezClient, EntrezConfig, LiteratureApi};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = EntrezClient::new(EntrezConfig::new("researcher@example.org"))?;
//! let found = client.search("crispr off-target", 100).await?;
//! let records = client.fetch(&found.ids[..10]).await?;
//! println!("{} of {} records fetched", records.len(), found.count);
//! # Ok(())
//! # }
//! ```

mod entrez;
mod error;
mod http_client;

use async_trait::async_trait;

use crate::record::Record;

pub use entrez::{DEFAULT_BASE_URL, EFETCH_POST_THRESHOLD, EntrezClient, EntrezConfig};
pub use error::ApiError;
pub use http_client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};

/// Result of a search call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResult {
    /// Total number of matches reported by the service.
    pub count: u64,
    /// Matching identifiers in service order, at most `max_results` long.
    pub ids: Vec<String>,
}

/// The two-operation remote API consumed by the pipeline.
#[async_trait]
pub trait LiteratureApi: Send + Sync {
    /// Resolves a query into at most `max_results` identifiers.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidQuery`] when the service rejects the query, or a
    /// transient/authorization error.
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResult, ApiError>;

    /// Fetches full records for the given identifiers, in service order.
    ///
    /// # Errors
    ///
    /// A transient error (retryable) or a permanent request error.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<Record>, ApiError>;
}
