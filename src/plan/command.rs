// src/plan/command.rs

use std::collections::{BTreeMap, BTreeSet};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info};

use crate::config::{ConfigFile, TaskConfig};
use crate::errors::FatalError;
use crate::exec::shell::run_shell;
use crate::exec::{BoxedTask, Plan, Task, TaskFuture};

/// Task definitions plus the set of tasks that completed, shared between a
/// plan and every task it hands out.
#[derive(Debug)]
struct Catalog {
    tasks: BTreeMap<String, TaskConfig>,
    /// Child name -> names of the tasks listing it in `then`.
    parents: BTreeMap<String, Vec<String>>,
    done: Mutex<BTreeSet<String>>,
    /// Tasks handed out during the current batch.
    claimed: Mutex<BTreeSet<String>>,
}

impl Catalog {
    fn is_done(&self, name: &str) -> bool {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    fn mark_done(&self, name: &str) {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    /// Start a new batch made of `names`.
    fn reset_claims<'a>(&self, names: impl IntoIterator<Item = &'a String>) {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        claimed.clear();
        claimed.extend(names.into_iter().cloned());
    }

    /// Returns false if the task was already handed out in this batch.
    fn claim(&self, name: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string())
    }

    /// A task is ready when it is not done yet and is either a root or has at
    /// least one completed parent.
    fn is_ready(&self, name: &str) -> bool {
        if self.is_done(name) {
            return false;
        }
        match self.parents.get(name) {
            None => true,
            Some(parents) => parents.iter().any(|p| self.is_done(p)),
        }
    }
}

/// Plan over the `[task.<name>]` entries of a [`ConfigFile`].
///
/// Every call to `create` offers the ready tasks that have not completed
/// yet. A task completes when its `post` step succeeds, so a task whose
/// command failed is offered again on the next iteration. Children listed in
/// `then` run right after their parent; if one of them fails it is offered
/// on its own afterwards. A task runs at most once per batch, so a child
/// shared by several parents is not retried by the next parent in the same
/// batch.
#[derive(Debug, Clone)]
pub struct CommandPlan {
    catalog: Arc<Catalog>,
}

impl CommandPlan {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut parents: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, task) in cfg.tasks().iter() {
            for child in task.then.iter() {
                parents.entry(child.clone()).or_default().push(name.clone());
            }
        }

        Self {
            catalog: Arc::new(Catalog {
                tasks: cfg.tasks().clone(),
                parents,
                done: Mutex::new(BTreeSet::new()),
                claimed: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    /// Whether the named task has completed.
    pub fn is_done(&self, name: &str) -> bool {
        self.catalog.is_done(name)
    }

    /// Names of the completed tasks, sorted.
    pub fn completed(&self) -> Vec<String> {
        self.catalog
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Names of the tasks the next `create` call would offer.
    pub fn ready(&self) -> Vec<String> {
        self.catalog
            .tasks
            .keys()
            .filter(|name| self.catalog.is_ready(name))
            .cloned()
            .collect()
    }
}

impl Plan for CommandPlan {
    fn create(&mut self) -> TaskFuture<'_, Vec<BoxedTask>> {
        Box::pin(async move {
            let ready = self.ready();
            debug!(?ready, "command plan offering tasks");
            self.catalog.reset_claims(&ready);
            Ok(ready
                .into_iter()
                .filter_map(|name| CommandTask::new(name, &self.catalog))
                .map(|task| Box::new(task) as BoxedTask)
                .collect())
        })
    }
}

/// One `[task.<name>]` entry: `pre`, `cmd` and `post` shell commands.
#[derive(Debug)]
pub struct CommandTask {
    name: String,
    config: TaskConfig,
    catalog: Arc<Catalog>,
}

impl CommandTask {
    fn new(name: String, catalog: &Arc<Catalog>) -> Option<Self> {
        let config = catalog.tasks.get(&name)?.clone();
        Some(Self {
            name,
            config,
            catalog: Arc::clone(catalog),
        })
    }

    async fn run_step(&self, step: &str, cmd: &str) -> Result<()> {
        let status = run_shell(&self.name, step, cmd).await?;
        if !status.success() {
            bail!(
                "{} of task '{}' exited with code {}",
                step,
                self.name,
                exit_code(&status)
            );
        }
        Ok(())
    }

    fn children(&self) -> Vec<BoxedTask> {
        self.config
            .then
            .iter()
            .filter(|child| !self.catalog.is_done(child) && self.catalog.claim(child))
            .filter_map(|child| CommandTask::new(child.clone(), &self.catalog))
            .map(|task| Box::new(task) as BoxedTask)
            .collect()
    }
}

impl Task for CommandTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre(&mut self) -> TaskFuture<'_, ()> {
        Box::pin(async move {
            match self.config.pre {
                Some(ref pre) => self.run_step("pre", pre).await,
                None => Ok(()),
            }
        })
    }

    fn perform_action(&mut self) -> TaskFuture<'_, Vec<BoxedTask>> {
        Box::pin(async move {
            let status = run_shell(&self.name, "cmd", &self.config.cmd).await?;
            if !status.success() {
                let code = exit_code(&status);
                let cause = anyhow!("cmd of task '{}' exited with code {}", self.name, code);
                if self.config.fatal_exit_codes.contains(&code) {
                    return Err(FatalError::new(
                        format!("task '{}' exited with fatal code {}", self.name, code),
                        cause,
                    )
                    .into());
                }
                return Err(cause);
            }
            Ok(self.children())
        })
    }

    fn post(&mut self) -> TaskFuture<'_, ()> {
        Box::pin(async move {
            if let Some(ref post) = self.config.post {
                self.run_step("post", post).await?;
            }
            self.catalog.mark_done(&self.name);
            info!(task = %self.name, "task completed");
            Ok(())
        })
    }
}

fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
