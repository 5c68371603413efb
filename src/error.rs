//! Error types for the status checker
//!
//! One enum per concern, built with thiserror. Soft failures (entity not
//! found, property absent) are modelled as `Option` at the call site and never
//! appear here.

use thiserror::Error;

/// Errors raised while talking to Wikipedia / Wikidata
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by upstream, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("upstream API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

impl KnowledgeError {
    /// Whether the request is worth repeating after a backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed(_) | Self::Api { .. } | Self::Url(_) => false,
        }
    }

    /// Upstream-provided `Retry-After` hint, if any
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Errors raised by the backing record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("throughput exceeded: {0}")]
    Throttled(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid item {key}: {reason}")]
    InvalidItem { key: String, reason: String },

    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    #[error("batch of {0} items exceeds the batch-write limit")]
    BatchTooLarge(usize),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while publishing a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification endpoint rejected message with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid notification endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Configuration loading/validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{0}")]
    Invalid(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Invocation-fatal errors caught at the top of the reconciliation loop
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid invocation payload: {0}")]
    Payload(String),
}
