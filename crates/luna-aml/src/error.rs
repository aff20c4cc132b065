//! Adapter error types.

use thiserror::Error;

/// Adapter error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code from the service.
        code: String,
        /// Error message from the service.
        message: String,
    },

    /// Token acquisition failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] luna_auth::AuthError),

    /// The service rejected the bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration or secret resolution failed.
    #[error("Configuration error: {0}")]
    Config(#[from] luna_config::ConfigError),

    /// Workspace resource id does not have the expected shape.
    #[error("Invalid workspace resource id '{resource_id}': {reason}")]
    InvalidResourceId { resource_id: String, reason: String },

    /// The service returned 404 for a resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No run matched the tag filter.
    #[error("No operation matches {filter}")]
    OperationNotFound { filter: String },

    /// More than one run matched a lookup that expects exactly one.
    ///
    /// `count` is the number of runs seen before the lookup stopped.
    #[error("Operation {operation_id} is ambiguous: at least {count} runs match")]
    AmbiguousOperation { operation_id: String, count: usize },

    /// The matched run has no child runs to read outputs from.
    #[error("Run {run_id} has no child runs")]
    NoChildRun { run_id: String },

    /// A matched run lacks a tag the adapter reads back.
    #[error("Run {run_id} is missing tag '{tag}'")]
    MissingTag { run_id: String, tag: String },

    /// Backend-specific failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    /// Check if this is a not-found condition (missing run, child or resource).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::OperationNotFound { .. }
                | Error::NoChildRun { .. }
                | Error::Api { status: 404, .. }
        )
    }

    /// Check if this is an ambiguous-match condition.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Error::AmbiguousOperation { .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::Auth(_) | Error::Unauthorized(_) | Error::Api { status: 401, .. }
        )
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::Api { status: 429, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error envelope returned by the Azure ML services.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
