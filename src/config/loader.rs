// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated model.
///
/// Use [`load_and_validate`] unless you need to tweak the raw config first.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

/// Parse a raw configuration from TOML text.
pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file and validate it:
///
/// - at least one task, each with a non-empty `cmd`
/// - parseable, non-zero durations in `[execloop]`
/// - `then` references that exist, are not self-references, and form no cycle
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}
