// tests/tolerance_properties.rs

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use execloop::exec::Phase;
use execloop::{Executor, Options};
use execloop_test_utils::scripted::{ScriptedPlan, TaskScript};

fn phase_strategy() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Pre),
        Just(Phase::PerformAction),
        Just(Phase::Post),
    ]
}

/// `n` healthy tasks with one flaky task inserted at `flaky_at`.
fn scripts(n: usize, flaky_at: usize, phase: Phase, failures: usize) -> Vec<Arc<TaskScript>> {
    let mut scripts: Vec<_> = (0..n)
        .map(|i| TaskScript::ok(&format!("task_{i}")))
        .collect();
    let flaky = TaskScript::builder("flaky").fail_in(phase, failures).build();
    scripts.insert(flaky_at.min(n), flaky);
    scripts
}

fn run(plan: &mut ScriptedPlan, errors_to_tolerate: usize) -> (execloop::Result<()>, usize) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let mut executor = Executor::new(
            Options::default()
                .with_sleep_between_runs(Duration::ZERO)
                .with_errors_to_tolerate(errors_to_tolerate),
        );
        let result = executor.run(plan).await;
        (result, executor.error_count())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn failures_within_budget_still_complete(
        n in 0..6usize,
        flaky_at in 0..6usize,
        phase in phase_strategy(),
        failures in 0..5usize,
        slack in 0..3usize,
    ) {
        let mut plan = ScriptedPlan::new(scripts(n, flaky_at, phase, failures));
        let (result, errors) = run(&mut plan, failures + slack);

        prop_assert!(result.is_ok());
        prop_assert_eq!(errors, failures);

        let journal = plan.journal();
        prop_assert_eq!(journal.attempts("flaky"), failures + 1);
        let expected_posts = if phase == Phase::Post { failures + 1 } else { 1 };
        prop_assert_eq!(journal.count("flaky", Phase::Post), expected_posts);
        for i in 0..n {
            let name = format!("task_{i}");
            prop_assert_eq!(journal.attempts(&name), 1);
            prop_assert_eq!(journal.count(&name, Phase::PerformAction), 1);
            prop_assert_eq!(journal.count(&name, Phase::Post), 1);
        }
    }

    #[test]
    fn failures_beyond_budget_abort_after_budget_plus_one(
        n in 0..6usize,
        flaky_at in 0..6usize,
        phase in phase_strategy(),
        tolerate in 0..4usize,
        extra in 1..3usize,
    ) {
        let mut plan = ScriptedPlan::new(scripts(n, flaky_at, phase, tolerate + extra));
        let (result, errors) = run(&mut plan, tolerate);

        let err = result.expect_err("budget must be exhausted");
        prop_assert!(err.is_fatal());
        prop_assert_eq!(errors, tolerate + 1);

        let journal = plan.journal();
        prop_assert_eq!(journal.attempts("flaky"), tolerate + 1);
        // Post is only reached when it is the failing phase, and then it
        // never succeeds.
        let expected_posts = if phase == Phase::Post { tolerate + 1 } else { 0 };
        prop_assert_eq!(journal.count("flaky", Phase::Post), expected_posts);
    }
}
