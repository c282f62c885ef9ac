//! Error taxonomy for sources, storage, and the aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::SourceId;

/// Per-source failure. Always recoverable at the aggregator level.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rate limit exceeded for {board}")]
    RateLimitExceeded { board: SourceId },

    #[error("{board} API error: HTTP {status}")]
    SourceApi { board: SourceId, status: u16 },

    #[error("{board} requires authentication")]
    AuthenticationRequired {
        board: SourceId,
        authorize_url: Option<String>,
    },

    #[error("timeout")]
    Timeout { board: SourceId, after_ms: u64 },

    #[error("{board} request failed: {message}")]
    Transport { board: SourceId, message: String },

    #[error("{board} returned a malformed payload: {message}")]
    Decode { board: SourceId, message: String },

    #[error("{board} is missing credential `{field}`")]
    MissingCredentials {
        board: SourceId,
        field: &'static str,
    },
}

impl SourceError {
    pub fn board(&self) -> SourceId {
        match self {
            SourceError::RateLimitExceeded { board }
            | SourceError::SourceApi { board, .. }
            | SourceError::AuthenticationRequired { board, .. }
            | SourceError::Timeout { board, .. }
            | SourceError::Transport { board, .. }
            | SourceError::Decode { board, .. }
            | SourceError::MissingCredentials { board, .. } => *board,
        }
    }

    pub(crate) fn transport(board: SourceId, err: reqwest::Error) -> Self {
        SourceError::Transport {
            board,
            message: err.to_string(),
        }
    }
}

/// Failure reported by the storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that escape `Aggregator` calls. Per-source failures never do.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("source `{0}` is not configured")]
    SourceNotConfigured(SourceId),

    #[error("unknown source `{0}`")]
    UnknownSource(String),

    #[error("configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Structured per-source error object handed to callers of a single adapter
/// instead of propagating the underlying error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: bool,
    pub message: String,
    pub api: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(api: SourceId, message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            api: api.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn from_source_error(err: &SourceError) -> Self {
        Self::new(err.board(), err.to_string())
    }
}
