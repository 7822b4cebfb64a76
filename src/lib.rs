//! PubMed Export Library
//!
//! This library searches PubMed through NCBI E-utilities, fetches the
//! matching records in paced, retried batches, extracts each article's title
//! and first abstract segment, and writes them to a CSV file.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`client`] - Search/fetch API trait and the E-utilities client
//! - [`record`] - Decoded article records (generic XML element tree)
//! - [`extract`] - Per-field extraction with `"NA"` fallback
//! - [`pipeline`] - Batch planning, pacing, retry and the run driver
//! - [`export`] - CSV output of the result table

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod export;
pub mod extract;
pub mod pipeline;
pub mod record;
mod user_agent;

// Re-export commonly used types
pub use client::{ApiError, EntrezClient, EntrezConfig, LiteratureApi, SearchResult};
pub use export::{ExportError, write_table, write_table_to};
pub use extract::{ExtractedRow, FieldError, SENTINEL};
pub use pipeline::{
    AbandonPolicy, PipelineConfig, PipelineError, ResultTable, RetryPolicy, RunObserver,
    RunReport, run,
};
pub use record::{Record, RecordError};
pub use user_agent::TOOL_NAME;
