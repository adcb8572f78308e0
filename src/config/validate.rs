// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, LoopSection, RawConfigFile};
use crate::config::options::Options;
use crate::errors::{ExecloopError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ExecloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let options = validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(options, raw.task))
    }
}

/// Check a raw config and resolve its executor options.
pub fn validate_config(cfg: &RawConfigFile) -> Result<Options> {
    ensure_has_tasks(cfg)?;
    let options = resolve_options(&cfg.execloop)?;
    validate_task_commands(cfg)?;
    validate_task_children(cfg)?;
    validate_graph(cfg)?;
    Ok(options)
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(ExecloopError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn resolve_options(section: &LoopSection) -> Result<Options> {
    let mut options = Options::default();

    if let Some(ref s) = section.sleep_between_runs {
        let sleep = parse_duration(s).map_err(|e| {
            ExecloopError::ConfigError(format!("[execloop].sleep_between_runs: {e}"))
        })?;
        options = options.with_sleep_between_runs(sleep);
    }

    if let Some(errors) = section.errors_to_tolerate {
        options = options.with_errors_to_tolerate(errors);
    }

    if let Some(ref s) = section.execution_timeout {
        let timeout = parse_duration(s).map_err(|e| {
            ExecloopError::ConfigError(format!("[execloop].execution_timeout: {e}"))
        })?;
        if timeout.is_zero() {
            return Err(ExecloopError::ConfigError(
                "[execloop].execution_timeout must be greater than zero".to_string(),
            ));
        }
        options = options.with_execution_timeout(timeout);
    }

    if let Some(ref label) = section.label {
        options = options.with_label(label.clone());
    }

    Ok(options)
}

fn validate_task_commands(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(ExecloopError::ConfigError(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_task_children(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for child in task.then.iter() {
            if !cfg.task.contains_key(child) {
                return Err(ExecloopError::ConfigError(format!(
                    "task '{}' has unknown child '{}' in `then`",
                    name, child
                )));
            }
            if child == name {
                return Err(ExecloopError::ConfigError(format!(
                    "task '{}' cannot list itself in `then`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: parent -> child. For
    //   [task.A]
    //   then = ["B"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for child in task.then.iter() {
            graph.add_edge(name.as_str(), child.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(ExecloopError::TaskCycle(format!(
            "cycle detected in `then` graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
