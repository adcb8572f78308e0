// src/exec/executor.rs

//! The execution loop.

use std::sync::Arc;

use tokio::time::{Instant, sleep, sleep_until};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::config::Options;
use crate::errors::{ExecloopError, FatalError, Result};
use crate::exec::api::{BoxedTask, Plan};
use crate::exec::state::{Disposition, ExecutionState, Phase};

/// Drives a [`Plan`] until it runs out of work, a fatal error surfaces, or a
/// deadline passes.
///
/// Each iteration asks the plan for a batch, executes the batch depth-first
/// and then sleeps for [`Options::sleep_between_runs`]. Task errors are
/// counted across the whole lifetime of the executor (not per run); once
/// more than [`Options::errors_to_tolerate`] have been seen, the next error
/// aborts the run.
///
/// An executor is reusable but not shareable: every entry point takes
/// `&mut self`, so one executor never runs two loops at once. Distinct
/// executors are fully independent.
#[derive(Debug)]
pub struct Executor {
    options: Arc<Options>,
    state: ExecutionState,
}

impl Executor {
    pub fn new(options: Options) -> Self {
        let state = ExecutionState::new(options.errors_to_tolerate);
        Self {
            options: Arc::new(options),
            state,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Errors seen by this executor so far, across all runs.
    pub fn error_count(&self) -> usize {
        self.state.error_count()
    }

    /// Run the plan to completion on the current task, without a deadline.
    pub async fn run<P>(&mut self, plan: &mut P) -> Result<()>
    where
        P: Plan + ?Sized,
    {
        let span = self.run_span();
        debug!(parent: &span, "running without deadline");
        self.run_loop(plan).instrument(span).await
    }

    /// Run the plan, giving up after [`Options::execution_timeout`].
    ///
    /// See [`Executor::run_with_deadline`] for what happens to the loop when
    /// time runs out.
    pub async fn run_with_timeout<P>(&mut self, plan: P) -> Result<()>
    where
        P: Plan + 'static,
    {
        match self.timeout_deadline() {
            Some(deadline) => self.race(deadline, plan).await,
            None => {
                let mut plan = plan;
                self.run(&mut plan).await
            }
        }
    }

    /// Run the plan, giving up at `deadline` or after
    /// [`Options::execution_timeout`], whichever comes first.
    ///
    /// The loop runs on its own Tokio task while the caller waits for either
    /// the loop's result or the deadline. When the deadline wins,
    /// [`ExecloopError::DeadlineExceeded`] is returned and the loop task is
    /// detached, not aborted: a task phase that is still in flight keeps
    /// running until it returns on its own, and the loop may go on to query
    /// the plan again. Nothing observes its result any more. Plans that must
    /// stop promptly should check a deadline of their own.
    pub async fn run_with_deadline<P>(&mut self, deadline: Instant, plan: P) -> Result<()>
    where
        P: Plan + 'static,
    {
        let deadline = match self.timeout_deadline() {
            Some(budget) => deadline.min(budget),
            None => deadline,
        };
        self.race(deadline, plan).await
    }

    fn timeout_deadline(&self) -> Option<Instant> {
        Instant::now().checked_add(self.options.execution_timeout)
    }

    async fn race<P>(&mut self, deadline: Instant, mut plan: P) -> Result<()>
    where
        P: Plan + 'static,
    {
        let span = self.run_span();
        debug!(
            parent: &span,
            timeout_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            "running with deadline"
        );

        let worker = self.detached();
        let mut handle = tokio::spawn(
            async move { worker.run_loop(&mut plan).await }.instrument(span.clone()),
        );

        tokio::select! {
            joined = &mut handle => match joined {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(ExecloopError::Other(
                    anyhow::Error::new(err).context("execution loop task was cancelled"),
                )),
            },
            _ = sleep_until(deadline) => {
                warn!(parent: &span, "execution deadline exceeded; detaching running loop");
                Err(ExecloopError::DeadlineExceeded)
            }
        }
    }

    /// A handle on the same options and error counter, owned by a spawned
    /// loop.
    fn detached(&self) -> Executor {
        Executor {
            options: Arc::clone(&self.options),
            state: self.state.clone(),
        }
    }

    fn run_span(&self) -> Span {
        info_span!("execloop.run", label = self.options.label.as_deref())
    }

    async fn run_loop<P>(&self, plan: &mut P) -> Result<()>
    where
        P: Plan + ?Sized,
    {
        let mut iteration: u64 = 0;

        loop {
            iteration += 1;

            let tasks = match plan.create().await {
                Ok(tasks) => tasks,
                Err(err) => return Err(self.abort(self.plan_failure(err))),
            };

            if tasks.is_empty() {
                info!(iteration, "no more tasks to execute");
                return Ok(());
            }

            debug!(iteration, tasks = tasks.len(), "tasks remaining");

            if let Err(fatal) = self.execute(tasks).await {
                return Err(self.abort(fatal));
            }

            sleep(self.options.sleep_between_runs).await;
        }
    }

    /// Plan errors are never tolerated: they are counted, then always abort.
    fn plan_failure(&self, err: anyhow::Error) -> FatalError {
        self.state.record(Phase::Create, &err);
        match err.downcast::<FatalError>() {
            Ok(fatal) => fatal,
            Err(err) => FatalError::new("plan creation failed", err),
        }
    }

    fn abort(&self, fatal: FatalError) -> ExecloopError {
        error!(
            error = %fatal,
            reason = %format!("{:#}", fatal.cause()),
            errors = self.state.error_count(),
            "execution aborted"
        );
        ExecloopError::Fatal(fatal)
    }

    /// Execute a batch depth-first.
    ///
    /// The stack holds one iterator per level of the task tree, so a task's
    /// children are drained before its next sibling is taken.
    async fn execute(&self, tasks: Vec<BoxedTask>) -> std::result::Result<(), FatalError> {
        let mut stack = vec![tasks.into_iter()];

        while let Some(siblings) = stack.last_mut() {
            let Some(task) = siblings.next() else {
                stack.pop();
                continue;
            };

            let span = info_span!("task", name = %task.name(), depth = stack.len());
            let children = self.execute_task(task).instrument(span).await?;

            if !children.is_empty() {
                stack.push(children.into_iter());
            }
        }

        Ok(())
    }

    /// Run one task's lifecycle and return its children.
    ///
    /// A tolerated failure in any phase ends the task early with no children.
    async fn execute_task(
        &self,
        mut task: BoxedTask,
    ) -> std::result::Result<Vec<BoxedTask>, FatalError> {
        info!("executing task");

        debug!("executing pre");
        let outcome = task.pre().await;
        let Some(()) = self.settle(Phase::Pre, outcome)? else {
            return Ok(Vec::new());
        };

        debug!("executing perform_action");
        let outcome = task.perform_action().await;
        let Some(children) = self.settle(Phase::PerformAction, outcome)? else {
            return Ok(Vec::new());
        };

        debug!("executing post");
        let outcome = task.post().await;
        let Some(()) = self.settle(Phase::Post, outcome)? else {
            return Ok(Vec::new());
        };

        info!(children = children.len(), "finished executing task");
        if !children.is_empty() {
            debug!("executing children tasks");
        }

        Ok(children)
    }

    fn settle<T>(
        &self,
        phase: Phase,
        outcome: anyhow::Result<T>,
    ) -> std::result::Result<Option<T>, FatalError> {
        match self.state.classify(phase, outcome) {
            Disposition::Proceed(value) => Ok(Some(value)),
            Disposition::Tolerate => Ok(None),
            Disposition::Abort(fatal) => Err(fatal),
        }
    }
}
