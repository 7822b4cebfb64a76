//! Integration tests for the batch pipeline.
//!
//! Drives `pipeline::run` end to end against an in-process API stub and
//! checks the CSV that lands on disk.

use std::sync::Mutex;
use std::time::Duration;

use pubmed_export::SENTINEL;
use pubmed_export::client::ApiError;
use pubmed_export::pipeline::{
    AbandonPolicy, NoopObserver, PipelineConfig, PipelineError, PlanError, RunObserver, collect,
    run,
};
use tempfile::TempDir;

mod support;
use support::fixtures::{StubApi, abstract_for, pmids, title_for};

fn config(dir: &TempDir, file: &str) -> PipelineConfig {
    PipelineConfig {
        batch_size: 50,
        max_attempts: 5,
        pace: Duration::ZERO,
        output: dir.path().join(file),
        ..PipelineConfig::new("hypertension")
    }
}

/// Records every abandoned batch the run reports.
#[derive(Default)]
struct AbandonLog {
    abandoned: Mutex<Vec<(usize, Vec<String>, u32)>>,
}

impl RunObserver for AbandonLog {
    fn batch_abandoned(&self, index: usize, ids: &[String], attempts: u32) {
        self.abandoned
            .lock()
            .unwrap()
            .push((index, ids.to_vec(), attempts));
    }
}

#[tokio::test]
async fn test_run_120_ids_in_three_batches_all_succeed() {
    let ids = pmids(120);
    let api = StubApi::new(ids.clone());
    let dir = TempDir::new().unwrap();
    let config = config(&dir, "all.csv");

    let report = run(&api, &config, &NoopObserver).await.unwrap();

    assert_eq!(report.ids_found, 120);
    assert_eq!(report.remote_count, 120);
    assert_eq!(report.batches_planned, 3);
    assert_eq!(report.batches_fetched, 3);
    assert_eq!(report.total_attempts, 3);
    assert_eq!(report.rows, 120);
    assert!(!report.has_abandoned());

    let sizes: Vec<usize> = api.fetched.lock().unwrap().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![50, 50, 20]);

    let expected_titles: Vec<String> = ids.iter().map(|id| title_for(id)).collect();
    assert_eq!(report.table.titles(), expected_titles.as_slice());

    let csv = std::fs::read_to_string(&config.output).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 121);
    assert_eq!(lines[0], "Title,Abstract");
    assert_eq!(
        lines[1],
        format!("Study {},Abstract of {}.", ids[0], ids[0])
    );
    assert_eq!(
        lines[120],
        format!("{},{}", title_for(&ids[119]), abstract_for(&ids[119]))
    );
}

#[tokio::test]
async fn test_abandoned_batch_fill_policy_keeps_row_correspondence() {
    let ids = pmids(120);
    let api = StubApi::new(ids.clone()).failing_batch(&ids[50]);
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        abandon_policy: AbandonPolicy::FillSentinel,
        ..config(&dir, "fill.csv")
    };
    let log = AbandonLog::default();

    let report = run(&api, &config, &log).await.unwrap();

    let abandoned = log.abandoned.lock().unwrap().clone();
    assert_eq!(abandoned, vec![(1, ids[50..100].to_vec(), 5)]);

    assert_eq!(api.fetch_calls(), 1 + 5 + 1);
    assert_eq!(report.total_attempts, 7);
    assert_eq!(report.batches_fetched, 2);
    assert_eq!(report.abandoned.len(), 1);
    assert_eq!(report.abandoned[0].index, 1);
    assert_eq!(report.abandoned[0].ids, ids[50..100].to_vec());

    assert_eq!(report.rows, 120);
    for (position, (title, abstract_text)) in report.table.rows().enumerate() {
        if (50..100).contains(&position) {
            assert_eq!((title, abstract_text), (SENTINEL, SENTINEL), "row {position}");
        } else {
            assert_eq!(title, title_for(&ids[position]), "row {position}");
        }
    }
    assert_eq!(report.table.sentinel_rows(), 50);

    let csv = std::fs::read_to_string(&config.output).unwrap();
    assert_eq!(csv.lines().count(), 121);
    assert_eq!(csv.lines().filter(|line| *line == "NA,NA").count(), 50);
}

#[tokio::test]
async fn test_abandoned_batch_omit_policy_drops_rows() {
    let ids = pmids(120);
    let api = StubApi::new(ids.clone()).failing_batch(&ids[50]);
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        abandon_policy: AbandonPolicy::Omit,
        ..config(&dir, "omit.csv")
    };

    let report = run(&api, &config, &NoopObserver).await.unwrap();

    assert_eq!(report.rows, 70);
    assert_eq!(report.abandoned.len(), 1);
    assert_eq!(report.table.titles()[49], title_for(&ids[49]));
    assert_eq!(report.table.titles()[50], title_for(&ids[100]));

    let csv = std::fs::read_to_string(&config.output).unwrap();
    assert_eq!(csv.lines().count(), 71);
    assert!(!csv.contains("NA,NA"));
}

#[tokio::test]
async fn test_invalid_query_aborts_before_any_batch_and_writes_nothing() {
    let api = StubApi::new(pmids(10))
        .search_fails(ApiError::invalid_query("((", "Search Backend failed"));
    let dir = TempDir::new().unwrap();
    let config = config(&dir, "never.csv");

    let err = run(&api, &config, &NoopObserver).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Search(ApiError::InvalidQuery { .. })
    ));
    assert_eq!(api.fetch_calls(), 0);
    assert!(!config.output.exists(), "output must not be created");
}

#[tokio::test]
async fn test_zero_batch_size_is_configuration_error() {
    let api = StubApi::new(pmids(10));
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        batch_size: 0,
        ..config(&dir, "zero.csv")
    };

    let err = run(&api, &config, &NoopObserver).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Plan(PlanError::InvalidBatchSize { size: 0 })
    ));
    assert_eq!(api.fetch_calls(), 0);
    assert!(!config.output.exists());
}

#[tokio::test]
async fn test_two_runs_produce_byte_identical_csv() {
    let ids = pmids(73);
    let dir = TempDir::new().unwrap();
    let first = config(&dir, "first.csv");
    let second = config(&dir, "second.csv");

    run(&StubApi::new(ids.clone()).failing_batch(&ids[0]), &first, &NoopObserver)
        .await
        .unwrap();
    run(&StubApi::new(ids.clone()).failing_batch(&ids[0]), &second, &NoopObserver)
        .await
        .unwrap();

    let a = std::fs::read(&first.output).unwrap();
    let b = std::fs::read(&second.output).unwrap();
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_collect_does_not_touch_output() {
    let api = StubApi::new(pmids(5));
    let dir = TempDir::new().unwrap();
    let config = config(&dir, "untouched.csv");

    let report = collect(&api, &config, &NoopObserver).await.unwrap();
    assert_eq!(report.rows, 5);
    assert!(!config.output.exists());
}

#[tokio::test(start_paused = true)]
async fn test_run_paces_every_attempt() {
    let ids = pmids(6);
    let api = StubApi::new(ids.clone()).failing_batch(&ids[3]);
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        batch_size: 3,
        max_attempts: 2,
        pace: Duration::from_secs(10),
        ..config(&dir, "paced.csv")
    };
    let start = tokio::time::Instant::now();

    let report = run(&api, &config, &NoopObserver).await.unwrap();

    // one attempt for batch 0, two for batch 1
    assert_eq!(report.total_attempts, 3);
    assert!(start.elapsed() >= Duration::from_secs(30));
}
