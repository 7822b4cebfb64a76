//! Resilient fetching of a single batch.
//!
//! A batch moves through an explicit [`BatchState`] machine:
//!
//! ```text
//! Pending(n) --pace, fetch--> Succeeded
//!            \--transient---> Pending(n + 1)   while n < max_attempts
//!            \--transient---> Abandoned        when n == max_attempts
//!            \--permanent---> Failed
//! ```
//!
//! [`fetch_batch`] drives the machine to a terminal state. Abandonment is
//! not an error: the caller continues with the next batch. A permanent
//! failure is returned as `Err` and ends the run.

use tracing::{debug, info, instrument, warn};

use crate::client::{ApiError, LiteratureApi};
use crate::record::Record;

use super::batch::Batch;
use super::pacer::Pacer;
use super::retry::{RetryDecision, RetryPolicy, classify_error};

/// State of one batch in the fetch state machine.
#[derive(Debug)]
pub enum BatchState {
    /// The batch still needs attempt number `attempt` (1-indexed).
    Pending {
        /// Attempt about to be made.
        attempt: u32,
    },

    /// A fetch call returned records.
    Succeeded {
        /// Records in service order.
        records: Vec<Record>,
        /// Attempts used, the successful one included.
        attempts: u32,
    },

    /// Every allowed attempt failed transiently.
    Abandoned {
        /// Attempts used.
        attempts: u32,
        /// Why the batch was given up.
        reason: String,
    },

    /// A non-retryable failure occurred.
    Failed {
        /// Attempts used.
        attempts: u32,
        /// The failure that stopped the batch.
        error: ApiError,
    },
}

impl BatchState {
    /// Initial state of every batch.
    #[must_use]
    pub fn start() -> Self {
        Self::Pending { attempt: 1 }
    }

    /// True once no further attempt will be made.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }

    /// Applies the result of the pending attempt.
    ///
    /// Terminal states are returned unchanged.
    #[must_use]
    pub fn record_attempt(
        self,
        result: Result<Vec<Record>, ApiError>,
        policy: &RetryPolicy,
    ) -> Self {
        let Self::Pending { attempt } = self else {
            return self;
        };

        let error = match result {
            Ok(records) => {
                return Self::Succeeded {
                    records,
                    attempts: attempt,
                };
            }
            Err(error) => error,
        };

        match policy.should_retry(classify_error(&error), attempt) {
            RetryDecision::Retry {
                attempt: next_attempt,
            } => {
                info!(
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts(),
                    error = %error,
                    "retrying batch"
                );
                Self::Pending {
                    attempt: next_attempt,
                }
            }
            RetryDecision::Abandon { reason } => Self::Abandoned {
                attempts: attempt,
                reason: format!("{reason}; last error: {error}"),
            },
            RetryDecision::Abort { reason } => {
                debug!(%reason, error = %error, "not retrying batch");
                Self::Failed {
                    attempts: attempt,
                    error,
                }
            }
        }
    }
}

/// Terminal, non-fatal result of fetching one batch.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The batch was fetched.
    Fetched {
        /// Records in service order.
        records: Vec<Record>,
        /// Attempts used.
        attempts: u32,
    },

    /// The batch was given up after exhausting its attempts.
    Abandoned {
        /// Attempts used.
        attempts: u32,
        /// Why the batch was given up.
        reason: String,
    },
}

impl BatchOutcome {
    /// Number of fetch calls the batch used.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fetched { attempts, .. } | Self::Abandoned { attempts, .. } => *attempts,
        }
    }

    /// True for an abandoned batch.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned { .. })
    }
}

/// Fetches one batch, pacing before every attempt and retrying transient
/// failures up to the policy bound.
///
/// # Errors
///
/// Returns the [`ApiError`] of a non-retryable failure. Exhausting all
/// attempts is reported as [`BatchOutcome::Abandoned`], not as an error.
#[instrument(skip_all, fields(batch = batch.index, ids = batch.len()))]
pub async fn fetch_batch<A>(
    api: &A,
    batch: Batch<'_>,
    policy: &RetryPolicy,
    pacer: &Pacer,
) -> Result<BatchOutcome, ApiError>
where
    A: LiteratureApi + ?Sized,
{
    let mut state = BatchState::start();

    loop {
        state = match state {
            BatchState::Pending { attempt } => {
                pacer.wait().await;
                debug!(attempt, "fetching batch");
                let result = api.fetch(batch.ids).await;
                BatchState::Pending { attempt }.record_attempt(result, policy)
            }
            BatchState::Succeeded { records, attempts } => {
                if records.len() != batch.len() {
                    warn!(
                        batch = batch.index,
                        requested = batch.len(),
                        received = records.len(),
                        "fetch returned a different number of records than requested"
                    );
                }
                return Ok(BatchOutcome::Fetched { records, attempts });
            }
            BatchState::Abandoned { attempts, reason } => {
                warn!(
                    batch = batch.index,
                    attempts,
                    ids = %batch.ids.join(","),
                    %reason,
                    "abandoning batch"
                );
                return Ok(BatchOutcome::Abandoned { attempts, reason });
            }
            BatchState::Failed { attempts, error } => {
                debug!(attempts, "batch failed permanently");
                return Err(error);
            }
        };
    }
}
