//! Scripted tasks and plans that record every lifecycle call.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use execloop::exec::Phase;
use execloop::{BoxedTask, FatalError, Plan, Task, TaskFuture};

/// Ordered record of phase invocations, e.g. `"a:pre"`, `"a:perform_action"`.
///
/// Cloning shares the underlying log.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task: &str, phase: Phase) {
        self.0.lock().unwrap().push(format!("{task}:{phase}"));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// How many times `phase` was invoked on `task`.
    pub fn count(&self, task: &str, phase: Phase) -> usize {
        let needle = format!("{task}:{phase}");
        self.0.lock().unwrap().iter().filter(|e| **e == needle).count()
    }

    /// Invocations of `pre`, i.e. how often the executor started the task.
    pub fn attempts(&self, task: &str) -> usize {
        self.count(task, Phase::Pre)
    }
}

#[derive(Debug)]
struct Failure {
    phase: Phase,
    remaining: AtomicUsize,
    fatal: bool,
}

/// Behaviour of one scripted task, shared by every instance a plan hands
/// out so failure counts and completion survive across iterations.
#[derive(Debug)]
pub struct TaskScript {
    name: String,
    failure: Option<Failure>,
    delay: Option<Duration>,
    children: Vec<Arc<TaskScript>>,
    done: AtomicBool,
}

impl TaskScript {
    pub fn builder(name: &str) -> TaskScriptBuilder {
        TaskScriptBuilder {
            name: name.to_string(),
            failure: None,
            delay: None,
            children: Vec::new(),
        }
    }

    /// A task that always succeeds.
    pub fn ok(name: &str) -> Arc<TaskScript> {
        Self::builder(name).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `post` has succeeded at least once.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    fn outcome(&self, phase: Phase) -> anyhow::Result<()> {
        let Some(ref failure) = self.failure else {
            return Ok(());
        };
        if failure.phase != phase {
            return Ok(());
        }
        if failure.fatal {
            return Err(FatalError::new(
                format!("task '{}' cannot continue", self.name),
                anyhow!("scripted fatal failure in {phase}"),
            )
            .into());
        }
        let took = failure
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            return Err(anyhow!("scripted failure of '{}' in {phase}", self.name));
        }
        Ok(())
    }

    fn instantiate(self: &Arc<Self>, journal: &Journal) -> BoxedTask {
        Box::new(ScriptedTask {
            script: Arc::clone(self),
            journal: journal.clone(),
        })
    }
}

pub struct TaskScriptBuilder {
    name: String,
    failure: Option<Failure>,
    delay: Option<Duration>,
    children: Vec<Arc<TaskScript>>,
}

impl TaskScriptBuilder {
    /// Fail `phase` the first `times` times it is invoked.
    pub fn fail_in(mut self, phase: Phase, times: usize) -> Self {
        self.failure = Some(Failure {
            phase,
            remaining: AtomicUsize::new(times),
            fatal: false,
        });
        self
    }

    /// Return a `FatalError` from `phase` every time.
    pub fn fatal_in(mut self, phase: Phase) -> Self {
        self.failure = Some(Failure {
            phase,
            remaining: AtomicUsize::new(0),
            fatal: true,
        });
        self
    }

    /// Sleep this long inside `perform_action`.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn child(mut self, child: Arc<TaskScript>) -> Self {
        self.children.push(child);
        self
    }

    pub fn build(self) -> Arc<TaskScript> {
        Arc::new(TaskScript {
            name: self.name,
            failure: self.failure,
            delay: self.delay,
            children: self.children,
            done: AtomicBool::new(false),
        })
    }
}

struct ScriptedTask {
    script: Arc<TaskScript>,
    journal: Journal,
}

impl Task for ScriptedTask {
    fn name(&self) -> &str {
        &self.script.name
    }

    fn pre(&mut self) -> TaskFuture<'_, ()> {
        Box::pin(async move {
            self.journal.record(&self.script.name, Phase::Pre);
            self.script.outcome(Phase::Pre)
        })
    }

    fn perform_action(&mut self) -> TaskFuture<'_, Vec<BoxedTask>> {
        Box::pin(async move {
            self.journal.record(&self.script.name, Phase::PerformAction);
            if let Some(delay) = self.script.delay {
                tokio::time::sleep(delay).await;
            }
            self.script.outcome(Phase::PerformAction)?;
            Ok(self
                .script
                .children
                .iter()
                .filter(|child| !child.is_done())
                .map(|child| child.instantiate(&self.journal))
                .collect())
        })
    }

    fn post(&mut self) -> TaskFuture<'_, ()> {
        Box::pin(async move {
            self.journal.record(&self.script.name, Phase::Post);
            self.script.outcome(Phase::Post)?;
            self.script.done.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Plan that offers, on every call, each top-level script that has not
/// completed yet, in the order given.
#[derive(Debug, Clone)]
pub struct ScriptedPlan {
    scripts: Vec<Arc<TaskScript>>,
    journal: Journal,
    calls: Arc<AtomicUsize>,
}

impl ScriptedPlan {
    pub fn new(scripts: Vec<Arc<TaskScript>>) -> Self {
        Self {
            scripts,
            journal: Journal::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Number of `create` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Plan for ScriptedPlan {
    fn create(&mut self) -> TaskFuture<'_, Vec<BoxedTask>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .scripts
                .iter()
                .filter(|script| !script.is_done())
                .map(|script| script.instantiate(&self.journal))
                .collect())
        })
    }
}

/// Plan whose `create` always fails, optionally with a `FatalError`.
#[derive(Debug, Clone, Default)]
pub struct FailingPlan {
    pub fatal: bool,
}

impl Plan for FailingPlan {
    fn create(&mut self) -> TaskFuture<'_, Vec<BoxedTask>> {
        let fatal = self.fatal;
        Box::pin(async move {
            let cause = anyhow!("backing store unavailable");
            if fatal {
                return Err(FatalError::new("plan gave up", cause).into());
            }
            Err(cause)
        })
    }
}
