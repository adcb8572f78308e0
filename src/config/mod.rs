// src/config/mod.rs

//! Executor options and the TOML configuration used by the `execloop` binary.
//!
//! - [`options`] holds [`Options`], the settings every `Executor` is built
//!   from. Embedders typically only need this.
//! - [`model`], [`loader`] and [`validate`] read a TOML file describing
//!   command tasks and turn it into a validated [`ConfigFile`].
//! - [`duration`] parses the `"500ms"` / `"20m"` strings used in the file.

pub mod duration;
pub mod loader;
pub mod model;
pub mod options;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, LoopSection, RawConfigFile, TaskConfig};
pub use options::Options;
pub use validate::validate_config;
