#![allow(dead_code)]

use std::collections::BTreeMap;

use execloop::config::{ConfigFile, LoopSection, RawConfigFile, TaskConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                execloop: LoopSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn sleep_between_runs(mut self, duration: &str) -> Self {
        self.config.execloop.sleep_between_runs = Some(duration.to_string());
        self
    }

    pub fn errors_to_tolerate(mut self, errors: usize) -> Self {
        self.config.execloop.errors_to_tolerate = Some(errors);
        self
    }

    pub fn execution_timeout(mut self, duration: &str) -> Self {
        self.config.execloop.execution_timeout = Some(duration.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                pre: None,
                post: None,
                then: vec![],
                fatal_exit_codes: vec![],
            },
        }
    }

    pub fn pre(mut self, cmd: &str) -> Self {
        self.task.pre = Some(cmd.to_string());
        self
    }

    pub fn post(mut self, cmd: &str) -> Self {
        self.task.post = Some(cmd.to_string());
        self
    }

    pub fn then(mut self, child: &str) -> Self {
        self.task.then.push(child.to_string());
        self
    }

    pub fn fatal_exit_code(mut self, code: i32) -> Self {
        self.task.fatal_exit_codes.push(code);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
