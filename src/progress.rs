//! Progress bar over batches for CLI runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use pubmed_export::RunObserver;

/// [`RunObserver`] that drives an `indicatif` progress bar.
///
/// When disabled the bar is hidden and every update is a no-op draw.
pub(crate) struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub(crate) fn new(enabled: bool) -> Self {
        let bar = ProgressBar::new(0);
        if enabled {
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} batches {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }

    #[cfg(test)]
    fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

impl RunObserver for BatchProgress {
    fn search_completed(&self, ids_found: usize, _remote_count: u64, batches: usize) {
        self.bar.set_length(batches as u64);
        self.bar.set_message(format!("({ids_found} articles)"));
    }

    fn batch_started(&self, index: usize, ids: usize) {
        self.bar
            .set_message(format!("fetching batch {} ({ids} ids)", index + 1));
    }

    fn batch_completed(&self, _index: usize, _rows: usize, _attempts: u32) {
        self.bar.inc(1);
    }

    fn batch_abandoned(&self, index: usize, _ids: &[String], attempts: u32) {
        self.bar.println(format!(
            "batch {} abandoned after {attempts} attempts",
            index + 1
        ));
        self.bar.inc(1);
    }
}
