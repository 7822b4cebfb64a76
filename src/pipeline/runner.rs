//! Sequential pipeline driver.
//!
//! [`run`] performs one complete export:
//!
//! 1. validate the batch size (before any network call)
//! 2. `search` the query into an ordered identifier set
//! 3. plan batches and fetch them one at a time through [`fetch_batch`]
//! 4. extract rows into the [`ResultAccumulator`]
//! 5. write the [`ResultTable`] once every batch is processed
//!
//! Progress is reported through a [`RunObserver`]; the CLI plugs a progress
//! bar in there, tests use [`NoopObserver`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::client::{ApiError, LiteratureApi};
use crate::export::{DEFAULT_OUTPUT, ExportError, write_table};

use super::accumulator::{ResultAccumulator, ResultTable};
use super::batch::{DEFAULT_BATCH_SIZE, PlanError, plan_batches, validate_batch_size};
use super::fetcher::{BatchOutcome, fetch_batch};
use super::pacer::{DEFAULT_PACE, Pacer};
use super::retry::{DEFAULT_MAX_RETRIES, RetryPolicy};

/// Default cap on identifiers requested from search.
pub const DEFAULT_MAX_RESULTS: usize = 10_000;

/// What an abandoned batch contributes to the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbandonPolicy {
    /// One sentinel row per identifier of the batch.
    #[default]
    FillSentinel,
    /// No rows.
    Omit,
}

impl AbandonPolicy {
    /// Short name used on the command line and in config files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FillSentinel => "fill",
            Self::Omit => "omit",
        }
    }
}

impl fmt::Display for AbandonPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbandonPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fill" => Ok(Self::FillSentinel),
            "omit" => Ok(Self::Omit),
            other => Err(format!(
                "unknown abandon policy {other:?} (expected \"fill\" or \"omit\")"
            )),
        }
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Search query, passed through unvalidated.
    pub query: String,
    /// Cap on identifiers requested from search.
    pub max_results: usize,
    /// Identifiers per fetch call.
    pub batch_size: usize,
    /// Wait before every fetch attempt.
    pub pace: Duration,
    /// Total attempts allowed per batch.
    pub max_attempts: u32,
    /// Rows contributed by abandoned batches.
    pub abandon_policy: AbandonPolicy,
    /// CSV output path.
    pub output: PathBuf,
}

impl PipelineConfig {
    /// Creates a configuration for `query` with default settings.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            batch_size: DEFAULT_BATCH_SIZE,
            pace: DEFAULT_PACE,
            max_attempts: DEFAULT_MAX_RETRIES,
            abandon_policy: AbandonPolicy::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

/// Run-level failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The batch configuration is invalid.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The search call failed.
    #[error("search failed: {0}")]
    Search(#[source] ApiError),

    /// A batch failed with a non-retryable error.
    #[error("batch {batch} failed: {source}")]
    Fetch {
        /// Index of the failing batch.
        batch: usize,
        /// The non-retryable error.
        #[source]
        source: ApiError,
    },

    /// The result table could not be written.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// A batch given up after exhausting its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedBatch {
    /// Batch index.
    pub index: usize,
    /// Identifiers of the batch.
    pub ids: Vec<String>,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Length of the identifier set.
    pub ids_found: usize,
    /// Total match count reported by the service.
    pub remote_count: u64,
    /// Number of batches planned.
    pub batches_planned: usize,
    /// Number of batches fetched successfully.
    pub batches_fetched: usize,
    /// Batches given up after exhausting their attempts.
    pub abandoned: Vec<AbandonedBatch>,
    /// Fetch calls made across all batches.
    pub total_attempts: u64,
    /// Rows in the result table.
    pub rows: usize,
    /// The exported table.
    pub table: ResultTable,
}

impl RunReport {
    /// True when at least one batch was abandoned.
    #[must_use]
    pub fn has_abandoned(&self) -> bool {
        !self.abandoned.is_empty()
    }
}

/// Progress callbacks invoked by [`run`]. Every method defaults to a no-op.
pub trait RunObserver: Send + Sync {
    /// Search returned `ids_found` identifiers planned into `batches` batches.
    fn search_completed(&self, _ids_found: usize, _remote_count: u64, _batches: usize) {}

    /// A batch is about to be fetched.
    fn batch_started(&self, _index: usize, _ids: usize) {}

    /// A batch was fetched and its rows appended.
    fn batch_completed(&self, _index: usize, _rows: usize, _attempts: u32) {}

    /// A batch was abandoned.
    fn batch_abandoned(&self, _index: usize, _ids: &[String], _attempts: u32) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Runs the whole pipeline and writes the CSV.
///
/// # Errors
///
/// - [`PipelineError::Plan`] for a zero batch size, before any network call
/// - [`PipelineError::Search`] when the search call fails; nothing is written
/// - [`PipelineError::Fetch`] on the first non-retryable fetch failure
/// - [`PipelineError::Export`] when the table cannot be written
#[instrument(skip(api, config, observer), fields(query = %config.query))]
pub async fn run<A>(
    api: &A,
    config: &PipelineConfig,
    observer: &dyn RunObserver,
) -> Result<RunReport, PipelineError>
where
    A: LiteratureApi + ?Sized,
{
    let report = collect(api, config, observer).await?;
    write_table(&report.table, &config.output)?;
    info!(
        path = %config.output.display(),
        rows = report.rows,
        "results written"
    );
    Ok(report)
}

/// Runs search, fetch and extraction without writing anything.
///
/// # Errors
///
/// Same as [`run`] except [`PipelineError::Export`].
pub async fn collect<A>(
    api: &A,
    config: &PipelineConfig,
    observer: &dyn RunObserver,
) -> Result<RunReport, PipelineError>
where
    A: LiteratureApi + ?Sized,
{
    validate_batch_size(config.batch_size)?;

    let search = api
        .search(&config.query, config.max_results)
        .await
        .map_err(PipelineError::Search)?;
    let ids = search.ids;

    let plan = plan_batches(&ids, config.batch_size)?;
    let batches_planned = plan.batch_count();
    info!(
        ids_found = ids.len(),
        remote_count = search.count,
        batches = batches_planned,
        "search completed"
    );
    observer.search_completed(ids.len(), search.count, batches_planned);

    let policy = RetryPolicy::with_max_attempts(config.max_attempts);
    let pacer = Pacer::new(config.pace);
    let mut accumulator = ResultAccumulator::with_capacity(ids.len());
    let mut report = RunReport {
        ids_found: ids.len(),
        remote_count: search.count,
        batches_planned,
        ..RunReport::default()
    };

    for batch in plan {
        info!(
            batch = batch.index + 1,
            of = batches_planned,
            ids = batch.len(),
            "fetching batch"
        );
        observer.batch_started(batch.index, batch.len());

        let outcome = fetch_batch(api, batch, &policy, &pacer)
            .await
            .map_err(|source| PipelineError::Fetch {
                batch: batch.index,
                source,
            })?;
        report.total_attempts += u64::from(outcome.attempts());

        match outcome {
            BatchOutcome::Fetched { records, attempts } => {
                let rows = accumulator.append_records(&records);
                report.batches_fetched += 1;
                observer.batch_completed(batch.index, rows, attempts);
            }
            BatchOutcome::Abandoned { attempts, .. } => {
                if config.abandon_policy == AbandonPolicy::FillSentinel {
                    accumulator.append_sentinels(batch.len());
                }
                report.abandoned.push(AbandonedBatch {
                    index: batch.index,
                    ids: batch.ids.to_vec(),
                });
                observer.batch_abandoned(batch.index, batch.ids, attempts);
            }
        }
    }

    if report.has_abandoned() {
        warn!(
            abandoned = report.abandoned.len(),
            policy = %config.abandon_policy,
            "some batches were abandoned"
        );
    }

    report.table = accumulator.finish();
    report.rows = report.table.len();
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::SearchResult;
    use crate::record::{Element, Record};

    struct CountingApi {
        ids: Vec<String>,
        searches: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl CountingApi {
        fn new(n: usize) -> Self {
            Self {
                ids: (1..=n).map(|i| i.to_string()).collect(),
                searches: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LiteratureApi for CountingApi {
        async fn search(&self, _query: &str, max: usize) -> Result<SearchResult, ApiError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResult {
                count: self.ids.len() as u64,
                ids: self.ids.iter().take(max).cloned().collect(),
            })
        }

        async fn fetch(&self, ids: &[String]) -> Result<Vec<Record>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(ids
                .iter()
                .map(|id| {
                    Record::new(
                        Element::new("PubmedArticle").with_child(
                            Element::new("MedlineCitation").with_child(
                                Element::new("Article").with_child(
                                    Element::new("ArticleTitle").with_text(format!("T{id}")),
                                ),
                            ),
                        ),
                    )
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RunObserver for RecordingObserver {
        fn batch_started(&self, index: usize, ids: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {index} {ids}"));
        }

        fn batch_completed(&self, index: usize, rows: usize, attempts: u32) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {index} {rows} {attempts}"));
        }
    }

    fn config(batch_size: usize) -> PipelineConfig {
        PipelineConfig {
            batch_size,
            pace: Duration::ZERO,
            ..PipelineConfig::new("q")
        }
    }

    #[test]
    fn test_abandon_policy_parsing() {
        assert_eq!("fill".parse::<AbandonPolicy>(), Ok(AbandonPolicy::FillSentinel));
        assert_eq!(" OMIT ".parse::<AbandonPolicy>(), Ok(AbandonPolicy::Omit));
        assert!("drop".parse::<AbandonPolicy>().is_err());
        assert_eq!(AbandonPolicy::default().to_string(), "fill");
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::new("cancer");
        assert_eq!(config.max_results, 10_000);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.pace, Duration::from_secs(10));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.output, PathBuf::from("pubmed_articles.csv"));
    }

    #[tokio::test]
    async fn test_zero_batch_size_fails_before_search() {
        let api = CountingApi::new(10);
        let err = collect(&api, &config(0), &NoopObserver).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Plan(PlanError::InvalidBatchSize { size: 0 })
        ));
        assert_eq!(api.searches.load(Ordering::SeqCst), 0);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_collect_reports_and_notifies_in_order() {
        let api = CountingApi::new(7);
        let observer = RecordingObserver::default();

        let report = collect(&api, &config(3), &observer).await.unwrap();

        assert_eq!(report.ids_found, 7);
        assert_eq!(report.batches_planned, 3);
        assert_eq!(report.batches_fetched, 3);
        assert_eq!(report.total_attempts, 3);
        assert_eq!(report.rows, 7);
        assert!(!report.has_abandoned());
        assert_eq!(report.table.titles()[0], "T1");
        assert_eq!(report.table.titles()[6], "T7");

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start 0 3", "done 0 3 1", "start 1 3", "done 1 3 1", "start 2 1", "done 2 1 1"
            ]
        );
    }

    #[tokio::test]
    async fn test_max_results_caps_identifier_set() {
        let api = CountingApi::new(30);
        let config = PipelineConfig {
            max_results: 12,
            ..config(5)
        };
        let report = collect(&api, &config, &NoopObserver).await.unwrap();
        assert_eq!(report.remote_count, 30);
        assert_eq!(report.ids_found, 12);
        assert_eq!(report.rows, 12);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_search_writes_header_only() {
        let api = CountingApi::new(0);
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            output: dir.path().join("empty.csv"),
            ..config(50)
        };

        let report = run(&api, &config, &NoopObserver).await.unwrap();
        assert_eq!(report.batches_planned, 0);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(
            std::fs::read_to_string(&config.output).unwrap(),
            "Title,Abstract\n"
        );
    }
}
