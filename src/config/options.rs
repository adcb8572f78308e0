// src/config/options.rs

use std::time::Duration;

/// Default pause between two successful loop iterations.
pub const DEFAULT_SLEEP_BETWEEN_RUNS: Duration = Duration::from_secs(1);

/// Default number of non-fatal errors tolerated before a run is aborted.
pub const DEFAULT_ERRORS_TO_TOLERATE: usize = 5;

/// Default overall time budget for `run_with_timeout`.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Executor settings.
///
/// Built fluently from [`Options::default`]; every setting can be overridden
/// on its own:
///
/// ```
/// use std::time::Duration;
/// use execloop::Options;
///
/// let options = Options::default()
///     .with_errors_to_tolerate(2)
///     .with_sleep_between_runs(Duration::from_millis(100));
///
/// assert_eq!(options.errors_to_tolerate, 2);
/// assert_eq!(options.execution_timeout, Duration::from_secs(20 * 60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Pause after every iteration that executed a non-empty batch.
    pub sleep_between_runs: Duration,

    /// Cumulative number of errors the executor absorbs. The error that
    /// pushes the count above this value aborts the run.
    pub errors_to_tolerate: usize,

    /// Time budget used by `Executor::run_with_timeout`, and the upper bound
    /// applied to any deadline given to `Executor::run_with_deadline`.
    pub execution_timeout: Duration,

    /// Optional label recorded on the `execloop.run` tracing span, useful
    /// when several executors log into the same subscriber.
    pub label: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sleep_between_runs: DEFAULT_SLEEP_BETWEEN_RUNS,
            errors_to_tolerate: DEFAULT_ERRORS_TO_TOLERATE,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            label: None,
        }
    }
}

impl Options {
    pub fn with_sleep_between_runs(mut self, sleep: Duration) -> Self {
        self.sleep_between_runs = sleep;
        self
    }

    pub fn with_errors_to_tolerate(mut self, errors: usize) -> Self {
        self.errors_to_tolerate = errors;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
