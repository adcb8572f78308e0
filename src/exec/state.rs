// src/exec/state.rs

//! Error budget shared by every phase of every task an executor runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::errors::FatalError;

/// Lifecycle step an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Pre,
    PerformAction,
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Create => "create",
            Phase::Pre => "pre",
            Phase::PerformAction => "perform_action",
            Phase::Post => "post",
        };
        f.write_str(name)
    }
}

/// What the executor should do with the result of a task phase.
#[derive(Debug)]
pub enum Disposition<T> {
    /// The phase succeeded; continue with the task.
    Proceed(T),
    /// The phase failed but the run continues. The rest of this task and
    /// its children are skipped.
    Tolerate,
    /// Stop the run with this error.
    Abort(FatalError),
}

/// Cumulative error count of one executor.
///
/// The count only ever grows. It is kept behind an `Arc` so that a loop
/// detached by a deadline keeps a valid counter; increments still only
/// happen on the single task running the loop.
#[derive(Clone)]
pub struct ExecutionState {
    errors: Arc<AtomicUsize>,
    errors_to_tolerate: usize,
}

impl fmt::Debug for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionState")
            .field("errors", &self.error_count())
            .field("errors_to_tolerate", &self.errors_to_tolerate)
            .finish()
    }
}

impl ExecutionState {
    pub fn new(errors_to_tolerate: usize) -> Self {
        Self {
            errors: Arc::new(AtomicUsize::new(0)),
            errors_to_tolerate,
        }
    }

    /// Number of errors seen so far.
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Classify the outcome of a task phase.
    ///
    /// Every error is counted. Once the count exceeds the budget the error is
    /// wrapped in a new [`FatalError`], even if it already was one. Below the
    /// budget an explicit `FatalError` is passed through unchanged, one found
    /// further down the source chain aborts with the same message and the
    /// whole error as cause, and any other error is tolerated.
    pub fn classify<T>(&self, phase: Phase, outcome: anyhow::Result<T>) -> Disposition<T> {
        let err = match outcome {
            Ok(value) => return Disposition::Proceed(value),
            Err(err) => err,
        };

        let errors = self.record(phase, &err);

        if errors > self.errors_to_tolerate {
            return Disposition::Abort(FatalError::new(
                format!(
                    "reached maximum number of errors to tolerate {}",
                    self.errors_to_tolerate
                ),
                err,
            ));
        }

        let err = match err.downcast::<FatalError>() {
            Ok(fatal) => return Disposition::Abort(fatal),
            Err(err) => err,
        };

        // A `FatalError` carried as the source of a task's own error type.
        let wrapped = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<FatalError>())
            .map(|fatal| fatal.message().to_string());
        match wrapped {
            Some(message) => Disposition::Abort(FatalError::new(message, err)),
            None => Disposition::Tolerate,
        }
    }

    /// Count and log an error. Returns the new count.
    ///
    /// Used directly for errors that abort the run regardless of the budget,
    /// such as a failing plan.
    pub fn record(&self, phase: Phase, err: &anyhow::Error) -> usize {
        let errors = self.errors.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            %phase,
            errors,
            errors_to_tolerate = self.errors_to_tolerate,
            error = %format!("{err:#}"),
            "phase failed"
        );
        errors
    }
}
