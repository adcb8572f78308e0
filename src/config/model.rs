// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::options::Options;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [execloop]
/// sleep_between_runs = "1s"
/// errors_to_tolerate = 5
/// execution_timeout = "20m"
///
/// [task.fetch]
/// cmd = "curl -fsSO https://example.com/data.tar"
/// then = ["unpack"]
///
/// [task.unpack]
/// cmd = "tar xf data.tar"
/// ```
///
/// Every `[execloop]` key is optional and falls back to the [`Options`]
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Executor settings from `[execloop]`.
    #[serde(default)]
    pub execloop: LoopSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[execloop]` section. Durations are strings like `"500ms"` or `"20m"`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoopSection {
    #[serde(default)]
    pub sleep_between_runs: Option<String>,

    #[serde(default)]
    pub errors_to_tolerate: Option<usize>,

    #[serde(default)]
    pub execution_timeout: Option<String>,

    #[serde(default)]
    pub label: Option<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Command run as the task's action.
    pub cmd: String,

    /// Command run before `cmd`; the action is skipped if it fails.
    #[serde(default)]
    pub pre: Option<String>,

    /// Command run after `cmd` succeeded. The task only counts as done once
    /// this succeeds.
    #[serde(default)]
    pub post: Option<String>,

    /// Tasks executed as children of this one, right after it completes.
    #[serde(default)]
    pub then: Vec<String>,

    /// Exit codes of `cmd` that abort the whole run instead of being retried.
    #[serde(default)]
    pub fatal_exit_codes: Vec<i32>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (or the
/// loader helpers), so every `then` reference is known to exist and the task
/// graph is acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    options: Options,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(options: Options, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { options, task }
    }

    /// Executor options resolved from `[execloop]`.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Task definitions keyed by name.
    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    /// Names of tasks that are not a `then` child of any other task.
    pub fn root_tasks(&self) -> Vec<&str> {
        self.task
            .keys()
            .filter(|name| !self.task.values().any(|t| t.then.contains(*name)))
            .map(|s| s.as_str())
            .collect()
    }
}
