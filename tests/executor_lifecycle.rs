// tests/executor_lifecycle.rs

use std::error::Error;
use std::time::Duration;

use execloop::exec::Phase;
use execloop::{Executor, Options};
use execloop_test_utils::scripted::{ScriptedPlan, TaskScript};
use execloop_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn fast_options() -> Options {
    Options::default().with_sleep_between_runs(Duration::ZERO)
}

fn lifecycle(task: &str) -> Vec<String> {
    vec![
        format!("{task}:pre"),
        format!("{task}:perform_action"),
        format!("{task}:post"),
    ]
}

#[tokio::test]
async fn empty_plan_completes_without_running_anything() -> TestResult {
    init_tracing();

    let mut plan = ScriptedPlan::new(vec![]);
    let mut executor = Executor::new(fast_options());

    with_timeout(executor.run(&mut plan)).await?;

    assert_eq!(plan.calls(), 1);
    assert!(plan.journal().entries().is_empty());
    assert_eq!(executor.error_count(), 0);
    Ok(())
}

#[tokio::test]
async fn succeeding_tasks_run_each_phase_exactly_once() -> TestResult {
    init_tracing();

    let names = ["a", "b", "c", "d"];
    let mut plan = ScriptedPlan::new(names.iter().map(|n| TaskScript::ok(n)).collect());
    let mut executor = Executor::new(fast_options());

    with_timeout(executor.run(&mut plan)).await?;

    let expected: Vec<String> = names.iter().flat_map(|n| lifecycle(n)).collect();
    assert_eq!(plan.journal().entries(), expected);

    // One batch with work, then the empty batch that ends the run.
    assert_eq!(plan.calls(), 2);
    assert_eq!(executor.error_count(), 0);
    Ok(())
}

#[tokio::test]
async fn children_run_depth_first_before_next_sibling() -> TestResult {
    init_tracing();

    let grandchild = TaskScript::ok("grandchild");
    let first_child = TaskScript::builder("first_child").child(grandchild).build();
    let second_child = TaskScript::ok("second_child");
    let parent = TaskScript::builder("parent")
        .child(first_child)
        .child(second_child)
        .build();
    let sibling = TaskScript::ok("sibling");

    let mut plan = ScriptedPlan::new(vec![parent, sibling]);
    let mut executor = Executor::new(fast_options());

    with_timeout(executor.run(&mut plan)).await?;

    let expected: Vec<String> = [
        "parent",
        "first_child",
        "grandchild",
        "second_child",
        "sibling",
    ]
    .iter()
    .flat_map(|n| lifecycle(n))
    .collect();
    assert_eq!(plan.journal().entries(), expected);
    assert_eq!(plan.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_pre_skips_action_and_post_until_retried() -> TestResult {
    init_tracing();

    let flaky = TaskScript::builder("flaky").fail_in(Phase::Pre, 1).build();
    let mut plan = ScriptedPlan::new(vec![flaky]);
    let mut executor = Executor::new(fast_options());

    with_timeout(executor.run(&mut plan)).await?;

    let mut expected = vec!["flaky:pre".to_string()];
    expected.extend(lifecycle("flaky"));
    assert_eq!(plan.journal().entries(), expected);
    assert_eq!(executor.error_count(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_action_skips_post() -> TestResult {
    init_tracing();

    let flaky = TaskScript::builder("flaky")
        .fail_in(Phase::PerformAction, 2)
        .build();
    let mut plan = ScriptedPlan::new(vec![flaky]);
    let mut executor = Executor::new(fast_options());

    with_timeout(executor.run(&mut plan)).await?;

    let journal = plan.journal();
    assert_eq!(journal.attempts("flaky"), 3);
    assert_eq!(journal.count("flaky", Phase::PerformAction), 3);
    assert_eq!(journal.count("flaky", Phase::Post), 1);
    Ok(())
}

#[tokio::test]
async fn children_wait_for_parent_post_to_succeed() -> TestResult {
    init_tracing();

    let child = TaskScript::ok("child");
    let parent = TaskScript::builder("parent")
        .fail_in(Phase::Post, 1)
        .child(child)
        .build();
    let mut plan = ScriptedPlan::new(vec![parent]);
    let mut executor = Executor::new(fast_options());

    with_timeout(executor.run(&mut plan)).await?;

    let mut expected = lifecycle("parent");
    expected.extend(lifecycle("parent"));
    expected.extend(lifecycle("child"));
    assert_eq!(plan.journal().entries(), expected);
    assert_eq!(plan.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn failing_task_does_not_stop_its_siblings() -> TestResult {
    init_tracing();

    let child = TaskScript::ok("child");
    let broken = TaskScript::builder("broken")
        .fail_in(Phase::PerformAction, 1)
        .child(child)
        .build();
    let after = TaskScript::ok("after");

    let mut plan = ScriptedPlan::new(vec![broken, after]);
    let mut executor = Executor::new(fast_options());

    with_timeout(executor.run(&mut plan)).await?;

    let entries = plan.journal().entries();
    assert_eq!(
        &entries[..5],
        &[
            "broken:pre",
            "broken:perform_action",
            "after:pre",
            "after:perform_action",
            "after:post",
        ]
    );
    assert_eq!(plan.journal().attempts("after"), 1);
    assert_eq!(plan.journal().attempts("child"), 1);
    Ok(())
}
