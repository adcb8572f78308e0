// src/errors.rs

//! Crate-wide error types.
//!
//! - [`FatalError`] is what a task or plan returns (inside an
//!   `anyhow::Error`) to abort a run regardless of the tolerance budget. The
//!   executor also produces one when the budget is exhausted.
//! - [`ExecloopError`] is what the public entry points return.

use std::fmt;

use thiserror::Error;

/// An error that unconditionally aborts a run.
///
/// Task and plan authors signal non-recoverable failures by returning one of
/// these converted into an `anyhow::Error`:
///
/// ```
/// use execloop::FatalError;
///
/// fn check_disk() -> anyhow::Result<()> {
///     let cause = anyhow::anyhow!("no space left on device");
///     Err(FatalError::new("cannot continue", cause).into())
/// }
/// # assert!(check_disk().is_err());
/// ```
#[derive(Error)]
#[error("FatalError: {message}")]
pub struct FatalError {
    message: String,
    #[source]
    cause: anyhow::Error,
}

impl FatalError {
    pub fn new(message: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            message: message.into(),
            cause: cause.into(),
        }
    }

    /// Short description of why the run was aborted.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying error that triggered the abort.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    pub fn into_cause(self) -> anyhow::Error {
        self.cause
    }
}

impl fmt::Debug for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FatalError")
            .field("message", &self.message)
            .field("cause", &format_args!("{:#}", self.cause))
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum ExecloopError {
    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error("execution deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in task graph: {0}")]
    TaskCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecloopError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecloopError::Fatal(_))
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, ExecloopError::DeadlineExceeded)
    }

    /// Borrow the inner [`FatalError`], if this is one.
    pub fn as_fatal(&self) -> Option<&FatalError> {
        match self {
            ExecloopError::Fatal(fatal) => Some(fatal),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExecloopError>;
