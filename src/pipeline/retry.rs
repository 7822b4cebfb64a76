//! Retry policy for batch fetch failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying API errors and deciding what happens to a batch after a
//! failed fetch attempt.
//!
//! # Overview
//!
//! When a fetch fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - Temporary failures that may succeed on retry
//! - [`FailureType::Permanent`] - Failures that won't succeed regardless of retries
//!
//! The [`RetryPolicy`] then turns the failure type and the attempt count into
//! a [`RetryDecision`]. There is no backoff here: every attempt, first one
//! included, is preceded by the pacing wait of the
//! [`Pacer`](super::Pacer).
//!
//! # Example
//!
//! ```
//! use pubmed_export::client::ApiError;
//! use pubmed_export::pipeline::{RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = ApiError::transient_status("https://example.com/efetch.fcgi", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { attempt } => println!("retrying (attempt {attempt})"),
//!     RetryDecision::Abandon { reason } => println!("abandoning batch: {reason}"),
//!     RetryDecision::Abort { reason } => println!("aborting run: {reason}"),
//! }
//! ```

use tracing::{debug, instrument};

use crate::client::ApiError;

/// Default maximum attempts per batch (including the first attempt).
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: connection reset, timeout, 5xx server errors, HTTP 429.
    Transient,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: rejected query, malformed identifier, rejected API key.
    Permanent,
}

/// Decision on what to do after a failed fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Pace and try the batch again.
    Retry {
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up on this batch and continue with the next one.
    Abandon {
        /// Human-readable reason for abandoning.
        reason: String,
    },

    /// Stop the whole run; the failure is not retryable.
    Abort {
        /// Human-readable reason for aborting.
        reason: String,
    },
}

/// Bounded retry policy for batch fetches.
///
/// `max_attempts` bounds the total number of fetch calls for one batch,
/// the first attempt included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts per batch.
    ///
    /// Values below 1 are clamped to 1: a batch is always tried once.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines what to do after a failed attempt.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::Abort {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::Abandon {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(attempt, next_attempt = attempt + 1, "will retry");
        RetryDecision::Retry {
            attempt: attempt + 1,
        }
    }
}

/// Classifies an API error into a failure type for retry decisions.
///
/// | Error | Type | Rationale |
/// |-------|------|-----------|
/// | TransientNetwork | Transient | Network or server may recover |
/// | MalformedResponse | Transient | Truncated body, usually transport |
/// | InvalidQuery | Permanent | Same query fails again |
/// | InvalidRequest | Permanent | Same identifiers fail again |
/// | Unauthorized | Permanent | Credentials won't change |
/// | Client | Permanent | Local configuration issue |
#[must_use]
pub fn classify_error(error: &ApiError) -> FailureType {
    match error {
        ApiError::TransientNetwork { .. } | ApiError::MalformedResponse { .. } => {
            FailureType::Transient
        }
        ApiError::InvalidQuery { .. }
        | ApiError::InvalidRequest { .. }
        | ApiError::Unauthorized { .. }
        | ApiError::Client { .. } => FailureType::Permanent,
    }
}

/// Classifies an HTTP status code returned by the remote API.
///
/// `None` means the status is a success and needs no classification.
#[allow(clippy::match_same_arms)]
#[must_use]
pub fn classify_http_status(status: u16) -> Option<FailureType> {
    match status {
        200..=299 => None,

        408 => Some(FailureType::Transient), // Request Timeout
        429 => Some(FailureType::Transient), // Too Many Requests

        // Other 4xx won't change on retry
        400..=499 => Some(FailureType::Permanent),

        // Server errors are usually temporary
        500..=599 => Some(FailureType::Transient),

        _ => Some(FailureType::Permanent),
    }
}
