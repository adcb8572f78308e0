// src/exec/mod.rs

//! Execution layer.
//!
//! - [`api`] defines the [`Task`] and [`Plan`] traits embedders implement.
//! - [`executor`] owns the [`Executor`]: the plan → batch → sleep loop, the
//!   depth-first task walk, and the deadline race.
//! - [`state`] holds the cumulative error count and the policy deciding
//!   whether a failed phase is tolerated or aborts the run.
//! - [`shell`] runs shell commands for the command-backed plan in
//!   [`crate::plan`].

pub mod api;
pub mod executor;
pub mod shell;
pub mod state;

pub use api::{BoxedTask, Plan, Task, TaskFuture};
pub use executor::Executor;
pub use state::{Disposition, ExecutionState, Phase};
