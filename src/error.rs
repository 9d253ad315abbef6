//! Error types for the collaborator calls and the session control surface.
//!
//! Only `StartRejected` ever reaches a user; the other two are logged by the
//! thread that hit them and dropped.

use thiserror::Error;

use crate::measure::Mode;

/// Failure of a single pose-estimation request. Transient: the worker logs
/// it and moves on to the next claimed frame.
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("estimation request timed out")]
    Timeout,

    #[error("estimation transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("estimation service answered with status {0}")]
    Status(u16),

    #[error("malformed estimation response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for EstimateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EstimateError::Timeout
        } else {
            EstimateError::Transport(e)
        }
    }
}

/// Failure to store a finished score. Logged and swallowed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("score persistence timed out")]
    Timeout,

    #[error("score persistence transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unsuccessful status code: {0}")]
    Status(u16),
}

impl From<reqwest::Error> for PersistError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PersistError::Timeout
        } else {
            PersistError::Transport(e)
        }
    }
}

/// Reason a `start` command was declined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartRejected {
    #[error("Status is not in idle")]
    NotIdle(Mode),

    #[error("Keypoints does not detected.")]
    NoDetection,

    #[error("Measurement loop is not running")]
    Unavailable,
}
