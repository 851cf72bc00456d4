//! Error types for ptyrender.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SessionId;

/// Why a backend candidate did not reach the running state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Skipped without an attempt: availability check reported false
    Unavailable,
    /// Disabled by configuration
    Disabled,
    /// Start was attempted and failed
    Failed(String),
}

/// One entry in the list of backends tried during selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendAttempt {
    /// Backend name
    pub backend: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl BackendAttempt {
    /// Create a new attempt record.
    pub fn new(backend: impl Into<String>, outcome: AttemptOutcome) -> Self {
        Self {
            backend: backend.into(),
            outcome,
        }
    }
}

impl fmt::Display for BackendAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Unavailable => write!(f, "{}: unavailable", self.backend),
            AttemptOutcome::Disabled => write!(f, "{}: disabled", self.backend),
            AttemptOutcome::Failed(reason) => write!(f, "{}: {}", self.backend, reason),
        }
    }
}

fn format_attempts(attempts: &[BackendAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for ptyrender operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend failed to start the command
    #[error("Backend '{backend}' failed to start: {reason}")]
    BackendStart {
        /// Backend name
        backend: String,
        /// Failure reason
        reason: String,
    },

    /// Every backend candidate was skipped or failed
    #[error("All backends exhausted: {}", format_attempts(.attempts))]
    BackendsExhausted {
        /// Candidates in the order they were considered
        attempts: Vec<BackendAttempt>,
    },

    /// Requested size has zero rows or columns
    #[error("Invalid terminal size: {cols}x{rows}")]
    ResizeOutOfBounds {
        /// Requested columns
        cols: u16,
        /// Requested rows
        rows: u16,
    },

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session limit reached
    #[error("Session limit reached (max: {0})")]
    SessionLimitReached(usize),

    /// Session already terminated
    #[error("Session already terminated")]
    SessionTerminated,

    /// PTY-level errors
    #[error("PTY error: {0}")]
    Pty(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Attempts listed by a [`Error::BackendsExhausted`] error.
    pub fn attempts(&self) -> Option<&[BackendAttempt]> {
        match self {
            Error::BackendsExhausted { attempts } => Some(attempts),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
