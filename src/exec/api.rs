// src/exec/api.rs

//! The two capability traits an embedder implements.
//!
//! Both traits are object safe: a plan hands out `Box<dyn Task>` so a single
//! batch can mix unrelated task types, and a task's children may again be of
//! any type.

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every [`Task`] and [`Plan`] operation.
///
/// Errors are plain `anyhow::Error`s. Returning a
/// [`FatalError`](crate::FatalError) converted into one aborts the run
/// immediately; anything else is tolerated until the executor's error
/// budget runs out.
pub type TaskFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Owned, type-erased task as produced by plans and parent tasks.
pub type BoxedTask = Box<dyn Task>;

/// A unit of work with a `pre` → `perform_action` → `post` lifecycle.
///
/// The executor calls the phases strictly in that order and stops at the
/// first failing phase. `post` only runs after a successful
/// `perform_action`, and children returned by `perform_action` are only
/// executed once `post` has succeeded too.
///
/// `pre` and `post` default to no-ops.
pub trait Task: Send {
    /// Name used in logs. Not used for equality or ordering.
    fn name(&self) -> &str;

    fn pre(&mut self) -> TaskFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    /// Do the work. May return follow-up tasks, executed depth-first right
    /// after this task completes.
    fn perform_action(&mut self) -> TaskFuture<'_, Vec<BoxedTask>>;

    fn post(&mut self) -> TaskFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Source of work for the executor.
///
/// `create` is called once per loop iteration. Returning an empty batch is
/// the only way to finish a run successfully, so a plan must remember what
/// already succeeded and stop offering it. Work whose task failed in a
/// tolerated way is retried only if the plan offers it again.
pub trait Plan: Send {
    fn create(&mut self) -> TaskFuture<'_, Vec<BoxedTask>>;
}
