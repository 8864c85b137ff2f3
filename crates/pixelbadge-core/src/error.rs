//! Error types shared by the network-facing components.
//!
//! Network failures never cross a background task boundary. They are
//! converted into state flags by the component that owns the view, or
//! dropped silently when the context they belonged to has moved on.

use thiserror::Error;

/// A single failed request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Body(#[from] serde_json::Error),
    #[error("response is missing `{0}`")]
    Missing(&'static str),
}

impl ApiError {
    /// HTTP status for status failures.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ApiError::Status(status) => Some(*status),
            ApiError::Transport(err) => err.status(),
            ApiError::Body(_) | ApiError::Missing(_) => None,
        }
    }
}

/// Why a retried operation did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RetryError {
    /// Every attempt in the budget failed.
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },
    /// The page, sequence or view the operation belonged to changed.
    #[error("context changed while the operation was in flight")]
    Stale,
}
