//! Error types for sitedns
//!
//! This module defines all error types used throughout the crate, plus the
//! [`ErrorKind`] classification the reconciliation engine uses to decide
//! whether a provider failure is fatal, ignorable or merely counted.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for sitedns operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single error entry reported by a provider API
///
/// This is the raw payload kept for diagnostics. Providers fill `code` when
/// their API returns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Provider-specific error code, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Human-readable error message
    pub message: String,
}

impl ApiMessage {
    /// Create a message without an error code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create a message with an error code
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn join_messages(messages: &[ApiMessage]) -> String {
    if messages.is_empty() {
        return "no error details".to_string();
    }
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Core error type for sitedns
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failures (connection, timeout, unreadable body)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone, record or project not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider API answered with `success: false`
    #[error("Provider error ({provider}): {}", join_messages(.messages))]
    Api {
        /// Provider name
        provider: String,
        /// Raw error entries from the response payload
        messages: Vec<ApiMessage>,
    },

    /// The provider API refused the request at the HTTP level
    ///
    /// Keeps the raw entries next to the classification the status implies.
    #[error("Provider error ({provider}, HTTP {status}, {kind}): {}", join_messages(.messages))]
    Status {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
        /// Failure kind implied by the status
        kind: ErrorKind,
        /// Raw error entries from the response payload
        messages: Vec<ApiMessage>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP (transport) error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider API error from the raw error entries
    pub fn api(provider: impl Into<String>, messages: Vec<ApiMessage>) -> Self {
        Self::Api {
            provider: provider.into(),
            messages,
        }
    }

    /// Create an HTTP status error that keeps the raw error entries
    pub fn status(
        provider: impl Into<String>,
        status: u16,
        kind: ErrorKind,
        messages: Vec<ApiMessage>,
    ) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
            kind,
            messages,
        }
    }

    /// Raw provider messages attached to this error, if any
    pub fn api_messages(&self) -> &[ApiMessage] {
        match self {
            Self::Api { messages, .. } | Self::Status { messages, .. } => messages,
            _ => &[],
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Classification of a provider failure
///
/// Produced by [`crate::traits::ErrorClassifier::classify_error`]. The engine
/// never inspects error text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The desired object is already present; treated as success
    AlreadyExists,
    /// Zone, record or project is absent
    NotFound,
    /// Credentials rejected; fatal for the whole batch
    Authentication,
    /// Provider throttled the request
    RateLimited,
    /// Network or decoding failure during the call
    Transport,
    /// Any other failure reported by the provider
    Provider,
}

impl ErrorKind {
    /// Whether this failure should cancel sibling operations in a batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Authentication)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Transport => "transport",
            ErrorKind::Provider => "provider",
        };
        f.write_str(name)
    }
}
