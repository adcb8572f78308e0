// tests/command_plan.rs

#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use execloop::config::ConfigFile;
use execloop::plan::CommandPlan;
use execloop::{ExecloopError, Executor};
use execloop_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use execloop_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn fast(builder: ConfigFileBuilder) -> ConfigFile {
    builder.sleep_between_runs("0ms").build()
}

fn append(log: &Path, line: &str) -> String {
    format!("echo {} >> '{}'", line, log.display())
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn failing_command_is_offered_again_until_it_succeeds() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let marker = dir.path().join("marker");
    let flaky = format!(
        "test -f '{m}' || {{ touch '{m}'; exit 1; }}",
        m = marker.display()
    );

    let cfg = fast(
        ConfigFileBuilder::new()
            .errors_to_tolerate(3)
            .with_task("flaky", TaskConfigBuilder::new(&flaky).build())
            .with_task("steady", TaskConfigBuilder::new("true").build()),
    );
    let mut plan = CommandPlan::from_config(&cfg);
    assert_eq!(plan.ready(), vec!["flaky".to_string(), "steady".to_string()]);

    let mut executor = Executor::new(cfg.options().clone());
    with_timeout(executor.run(&mut plan)).await?;

    assert_eq!(plan.completed(), vec!["flaky".to_string(), "steady".to_string()]);
    assert!(plan.ready().is_empty());
    assert_eq!(executor.error_count(), 1);
    Ok(())
}

#[tokio::test]
async fn then_children_run_after_parent_post() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let log = dir.path().join("log");

    let cfg = fast(
        ConfigFileBuilder::new()
            .with_task(
                "fetch",
                TaskConfigBuilder::new(&append(&log, "fetch"))
                    .pre(&append(&log, "fetch-pre"))
                    .post(&append(&log, "fetch-post"))
                    .then("unpack")
                    .build(),
            )
            .with_task("unpack", TaskConfigBuilder::new(&append(&log, "unpack")).build())
            .with_task("zzz", TaskConfigBuilder::new(&append(&log, "zzz")).build()),
    );
    assert_eq!(cfg.root_tasks(), vec!["fetch", "zzz"]);

    let mut plan = CommandPlan::from_config(&cfg);
    let mut executor = Executor::new(cfg.options().clone());
    with_timeout(executor.run(&mut plan)).await?;

    assert_eq!(
        read_lines(&log),
        vec!["fetch-pre", "fetch", "fetch-post", "unpack", "zzz"]
    );
    assert!(plan.is_done("unpack"));
    Ok(())
}

#[tokio::test]
async fn failed_child_is_offered_on_its_own() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let log = dir.path().join("log");
    let marker = dir.path().join("marker");
    let child = format!(
        "test -f '{m}' || {{ touch '{m}'; exit 1; }}; {append}",
        m = marker.display(),
        append = append(&log, "child")
    );

    let cfg = fast(
        ConfigFileBuilder::new()
            .with_task(
                "parent",
                TaskConfigBuilder::new(&append(&log, "parent"))
                    .then("child")
                    .build(),
            )
            .with_task("child", TaskConfigBuilder::new(&child).build()),
    );

    let mut plan = CommandPlan::from_config(&cfg);
    let mut executor = Executor::new(cfg.options().clone());
    with_timeout(executor.run(&mut plan)).await?;

    // The parent is not repeated when only its child failed.
    assert_eq!(read_lines(&log), vec!["parent", "child"]);
    assert_eq!(executor.error_count(), 1);
    Ok(())
}

#[tokio::test]
async fn fatal_exit_code_aborts_the_run() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let log = dir.path().join("log");

    let cfg = fast(
        ConfigFileBuilder::new()
            .with_task(
                "a_broken",
                TaskConfigBuilder::new("exit 3").fatal_exit_code(3).build(),
            )
            .with_task("b_after", TaskConfigBuilder::new(&append(&log, "after")).build()),
    );

    let mut plan = CommandPlan::from_config(&cfg);
    let mut executor = Executor::new(cfg.options().clone());
    let result = with_timeout(executor.run(&mut plan)).await;

    match result {
        Err(ExecloopError::Fatal(fatal)) => {
            assert_eq!(fatal.message(), "task 'a_broken' exited with fatal code 3");
        }
        Err(e) => panic!("Expected fatal error, got: {:?}", e),
        Ok(()) => panic!("Expected error, got Ok"),
    }
    assert!(read_lines(&log).is_empty());
    assert!(plan.completed().is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_pre_never_runs_the_command() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let log = dir.path().join("log");

    let cfg = fast(
        ConfigFileBuilder::new()
            .errors_to_tolerate(1)
            .with_task(
                "guarded",
                TaskConfigBuilder::new(&append(&log, "ran"))
                    .pre("false")
                    .build(),
            ),
    );

    let mut plan = CommandPlan::from_config(&cfg);
    let mut executor = Executor::new(cfg.options().clone());
    let err = with_timeout(executor.run(&mut plan))
        .await
        .expect_err("pre keeps failing");

    let fatal = err.as_fatal().expect("fatal error");
    assert_eq!(
        fatal.message(),
        "reached maximum number of errors to tolerate 1"
    );
    assert!(fatal.cause().to_string().contains("pre of task 'guarded' exited with code 1"));
    assert!(read_lines(&log).is_empty());
    assert_eq!(executor.error_count(), 2);
    Ok(())
}

#[tokio::test]
async fn shared_child_runs_once_per_batch() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let log = dir.path().join("log");
    let marker = dir.path().join("marker");
    let shared = format!(
        "{append}; test -f '{m}' || {{ touch '{m}'; exit 1; }}",
        append = append(&log, "c"),
        m = marker.display()
    );

    let cfg = fast(
        ConfigFileBuilder::new()
            .with_task("a", TaskConfigBuilder::new(&append(&log, "a")).then("c").build())
            .with_task("b", TaskConfigBuilder::new(&append(&log, "b")).then("c").build())
            .with_task("c", TaskConfigBuilder::new(&shared).build())
            .with_task("d", TaskConfigBuilder::new(&append(&log, "d")).build()),
    );

    let mut plan = CommandPlan::from_config(&cfg);
    let mut executor = Executor::new(cfg.options().clone());
    with_timeout(executor.run(&mut plan)).await?;

    // `b` does not hand out `c` again after it failed under `a`; the retry
    // waits for the next batch, after `d`.
    assert_eq!(read_lines(&log), vec!["a", "c", "b", "d", "c"]);
    assert!(plan.is_done("c"));
    assert_eq!(executor.error_count(), 1);
    Ok(())
}
