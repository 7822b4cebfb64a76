//! Politeness pacing for fetch requests.
//!
//! The [`Pacer`] enforces a fixed wait before every fetch attempt, the first
//! one included. Unlike a "minimum gap since last request" limiter, the wait
//! is unconditional: it does not depend on how long the previous call took or
//! whether it failed.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pubmed_export::pipeline::Pacer;
//!
//! # async fn example() {
//! let pacer = Pacer::new(Duration::from_secs(10));
//! pacer.wait().await; // always sleeps 10s
//!
//! let pacer = Pacer::disabled();
//! pacer.wait().await; // returns immediately
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, instrument};

/// Default pacing interval between fetch attempts (10 seconds).
pub const DEFAULT_PACE: Duration = Duration::from_secs(10);

/// Fixed-interval pacing applied before each fetch attempt.
#[derive(Debug)]
pub struct Pacer {
    /// Wait applied before each attempt.
    interval: Duration,

    /// Whether pacing is disabled (interval of zero).
    disabled: bool,

    /// Total time spent waiting, in milliseconds.
    waited_ms: AtomicU64,
}

impl Pacer {
    /// Creates a pacer that waits `interval` before each attempt.
    ///
    /// A zero interval yields a disabled pacer.
    #[must_use]
    #[instrument(level = "debug", skip_all, fields(interval_ms = interval.as_millis()))]
    pub fn new(interval: Duration) -> Self {
        if interval.is_zero() {
            return Self::disabled();
        }
        debug!("creating pacer");
        Self {
            interval,
            disabled: false,
            waited_ms: AtomicU64::new(0),
        }
    }

    /// Creates a pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            interval: Duration::ZERO,
            disabled: true,
            waited_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the total time this pacer has spent waiting.
    #[must_use]
    pub fn total_waited(&self) -> Duration {
        Duration::from_millis(self.waited_ms.load(Ordering::SeqCst))
    }

    /// Suspends the caller for the pacing interval.
    pub async fn wait(&self) {
        if self.disabled {
            return;
        }

        debug!(delay_ms = self.interval.as_millis(), "pacing before fetch");
        tokio::time::sleep(self.interval).await;

        #[allow(clippy::cast_possible_truncation)]
        let waited = self.interval.as_millis() as u64;
        self.waited_ms.fetch_add(waited, Ordering::SeqCst);
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_PACE)
    }
}
