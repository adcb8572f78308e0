// src/lib.rs

//! A pluggable task execution loop.
//!
//! An [`Executor`] repeatedly asks a [`Plan`] for a batch of [`Task`]s and
//! drives each task through `pre` → `perform_action` → `post`, executing any
//! children a task produces depth-first. Failed phases are tolerated up to
//! [`Options::errors_to_tolerate`] errors; a [`FatalError`] ends the run at
//! once. The run ends successfully when the plan hands out an empty batch.
//!
//! ```no_run
//! use execloop::{BoxedTask, Executor, Options, Plan, Task, TaskFuture};
//!
//! struct Greet;
//!
//! impl Task for Greet {
//!     fn name(&self) -> &str {
//!         "greet"
//!     }
//!
//!     fn perform_action(&mut self) -> TaskFuture<'_, Vec<BoxedTask>> {
//!         Box::pin(async {
//!             println!("hello");
//!             Ok(Vec::new())
//!         })
//!     }
//! }
//!
//! struct Once(bool);
//!
//! impl Plan for Once {
//!     fn create(&mut self) -> TaskFuture<'_, Vec<BoxedTask>> {
//!         let first = !std::mem::replace(&mut self.0, true);
//!         Box::pin(async move {
//!             let tasks: Vec<BoxedTask> = if first { vec![Box::new(Greet)] } else { Vec::new() };
//!             Ok(tasks)
//!         })
//!     }
//! }
//!
//! # async fn demo() -> execloop::Result<()> {
//! let mut executor = Executor::new(Options::default());
//! executor.run_with_timeout(Once(false)).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;

use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate};
use crate::plan::CommandPlan;

pub use crate::config::Options;
pub use crate::errors::{ExecloopError, FatalError, Result};
pub use crate::exec::{BoxedTask, Executor, Plan, Task, TaskFuture};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, builds a [`CommandPlan`] and an [`Executor`] from it and
/// runs the loop until every task succeeded, the run aborts, the deadline
/// passes, or Ctrl-C is pressed.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let plan = CommandPlan::from_config(&cfg);
    let mut executor = Executor::new(cfg.options().clone());
    info!(roots = ?cfg.root_tasks(), options = ?cfg.options(), "starting execution loop");

    let outcome = tokio::select! {
        res = drive(&mut executor, plan.clone(), args.no_deadline) => res,
        _ = shutdown_signal() => {
            info!(completed = ?plan.completed(), "interrupted; exiting without waiting for running tasks");
            return Ok(());
        }
    };

    match outcome {
        Ok(()) => {
            info!(completed = ?plan.completed(), errors = executor.error_count(), "all tasks completed");
            Ok(())
        }
        Err(err) => {
            error!(completed = ?plan.completed(), pending = ?plan.ready(), "run did not complete");
            Err(err.into())
        }
    }
}

async fn drive(
    executor: &mut Executor,
    mut plan: CommandPlan,
    no_deadline: bool,
) -> Result<()> {
    if no_deadline {
        executor.run(&mut plan).await
    } else {
        executor.run_with_timeout(plan).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Simple dry-run output: print options, tasks and their commands.
fn print_dry_run(cfg: &ConfigFile) {
    let options = cfg.options();
    println!("execloop dry-run");
    println!("  execloop.sleep_between_runs = {:?}", options.sleep_between_runs);
    println!("  execloop.errors_to_tolerate = {}", options.errors_to_tolerate);
    println!("  execloop.execution_timeout = {:?}", options.execution_timeout);
    if let Some(ref label) = options.label {
        println!("  execloop.label = {label}");
    }
    println!();

    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks().iter() {
        println!("  - {name}");
        if let Some(ref pre) = task.pre {
            println!("      pre: {pre}");
        }
        println!("      cmd: {}", task.cmd);
        if let Some(ref post) = task.post {
            println!("      post: {post}");
        }
        if !task.then.is_empty() {
            println!("      then: {:?}", task.then);
        }
        if !task.fatal_exit_codes.is_empty() {
            println!("      fatal_exit_codes: {:?}", task.fatal_exit_codes);
        }
    }
    println!();
    println!("roots: {:?}", cfg.root_tasks());

    debug!("dry-run complete (no execution)");
}
