//! Batch pipeline from identifier set to result table.
//!
//! This module turns the identifiers returned by a search into fetched,
//! extracted rows, one batch at a time.
//!
//! # Features
//!
//! - Lazy, order-preserving batch planning
//! - Fixed pacing wait before every fetch attempt
//! - Bounded retry of transient failures, then batch abandonment
//! - Configurable handling of abandoned batches (sentinel rows or omission)
//!
//! # Example
//!
//! ```no_run
//! use pubmed_export::client::{EntrezClient, EntrezConfig};
//! use pubmed_export::pipeline::{NoopObserver, PipelineConfig, run};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = EntrezClient::new(EntrezConfig::new("researcher@example.org"))?;
//! let config = PipelineConfig::new("sickle cell gene therapy");
//! let report = run(&client, &config, &NoopObserver).await?;
//! println!("{} identifiers, {} rows", report.ids_found, report.rows);
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod batch;
mod fetcher;
mod pacer;
mod retry;
mod runner;

pub use accumulator::{COLUMNS, ResultAccumulator, ResultTable};
pub use batch::{
    Batch, BatchPlan, DEFAULT_BATCH_SIZE, PlanError, batch_count, plan_batches,
    validate_batch_size,
};
pub use fetcher::{BatchOutcome, BatchState, fetch_batch};
pub use pacer::{DEFAULT_PACE, Pacer};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    classify_http_status,
};
pub use runner::{
    AbandonPolicy, AbandonedBatch, DEFAULT_MAX_RESULTS, NoopObserver, PipelineConfig,
    PipelineError, RunObserver, RunReport, collect, run,
};
