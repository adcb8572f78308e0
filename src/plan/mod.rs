// src/plan/mod.rs

//! Ready-made [`Plan`](crate::Plan) implementations.
//!
//! [`CommandPlan`] runs the shell commands declared in a TOML config and is
//! what the `execloop` binary drives. Libraries embedding the executor will
//! usually bring their own plan instead.

pub mod command;

pub use command::{CommandPlan, CommandTask};
