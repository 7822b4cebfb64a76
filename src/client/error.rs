//! Error types for the remote API client.
//!
//! Every failure of a `search` or `fetch` call is reported as an [`ApiError`].
//! Retry decisions are made by the pipeline from
//! [`classify_error`](crate::pipeline::classify_error);
//! the client itself never retries.

use thiserror::Error;

use crate::pipeline::{FailureType, classify_error};

/// Errors that can occur while talking to the remote search/fetch API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The search term was rejected by the remote service.
    #[error("invalid query {query:?}: {message}")]
    InvalidQuery {
        /// The query text as submitted.
        query: String,
        /// Reason reported by the service.
        message: String,
    },

    /// The request was malformed (e.g. an identifier the service refuses).
    #[error("invalid request to {endpoint}: {message}")]
    InvalidRequest {
        /// The endpoint that rejected the request.
        endpoint: String,
        /// Reason reported by the service or HTTP status.
        message: String,
    },

    /// Credentials (API key) were rejected.
    #[error("authorization rejected by {endpoint} (HTTP {status})")]
    Unauthorized {
        /// The endpoint that rejected the request.
        endpoint: String,
        /// The HTTP status code (401 or 403).
        status: u16,
    },

    /// Network-level or server-side failure that may succeed on retry.
    #[error("transient failure calling {endpoint}: {message}")]
    TransientNetwork {
        /// The endpoint being called.
        endpoint: String,
        /// Description of the failure.
        message: String,
        /// HTTP status if a response was received.
        status: Option<u16>,
    },

    /// The response body could not be decoded.
    ///
    /// A truncated or garbled body is almost always a transport problem, so
    /// this is retried like a network failure.
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse {
        /// The endpoint that produced the body.
        endpoint: String,
        /// Decoder error message.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client construction failed: {message}")]
    Client {
        /// Builder error message.
        message: String,
    },
}

impl ApiError {
    /// Creates an invalid-query error.
    pub fn invalid_query(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    pub fn unauthorized(endpoint: impl Into<String>, status: u16) -> Self {
        Self::Unauthorized {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates a transient error without an HTTP status (connect failure, timeout).
    pub fn transient(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            endpoint: endpoint.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Creates a transient error for a retryable HTTP status.
    pub fn transient_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::TransientNetwork {
            endpoint: endpoint.into(),
            message: format!("HTTP {status}"),
            status: Some(status),
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Returns true when the failure may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        classify_error(self) == FailureType::Transient
    }
}
