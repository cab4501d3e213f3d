//! End-to-end runs through the orchestrator with scripted processes.

use super::support::{comparator_output, rendering_runner, test_config, COMPARE, RENDERER};
use raster_regress::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn single(input: &str, produced: &str, output_dir: Option<&str>) -> TestCase {
    TestCase::new(
        input,
        vec![(produced.to_string(), format!("ref/{produced}"))],
        output_dir.map(str::to_string),
    )
    .unwrap()
}

#[tokio::test]
async fn test_similar_frame_lands_in_passes() {
    let dir = tempfile::tempdir().unwrap();
    let suite = TestSuite::new("smoke", vec![single("empty_box.xml", "empty_box_1.ppm.png", None)]);
    let runner = rendering_runner(dir.path(), &suite)
        .on(COMPARE, |_| Ok(comparator_output("0.998", 0)));

    let outcome = Orchestrator::with_runner(test_config(dir.path()), Arc::new(runner.clone()))
        .run_with_status(&suite, Vec::new())
        .await
        .unwrap();

    let passes = outcome.aggregate.passes();
    assert_eq!(passes.len(), 1);
    assert!(outcome.aggregate.failures().is_empty());
    assert_eq!(passes[0].input, "empty_box.xml");
    assert_eq!(passes[0].output, "empty_box_1.ppm.png");
    assert_eq!(passes[0].score, Some(0.998));
    assert_eq!(passes[0].metric, ComparisonMetric::Ssim);

    let compare_calls = runner.invocations_of(COMPARE);
    assert_eq!(
        compare_calls[0].args,
        vec!["-metric", "SSIM", "ref/empty_box_1.ppm.png", "empty_box_1.ppm.png", "null:"]
    );
}

#[tokio::test]
async fn test_unparseable_score_is_isolated_to_its_case() {
    let dir = tempfile::tempdir().unwrap();
    let suite = TestSuite::new(
        "mixed",
        vec![
            single("broken.xml", "broken.png", None),
            single("healthy.xml", "healthy.png", None),
        ],
    );
    let runner = rendering_runner(dir.path(), &suite).on(COMPARE, |args: &[String]| {
        if args[3] == "broken.png" {
            Ok(comparator_output("compare: improper image header", 2))
        } else {
            Ok(comparator_output("0.91", 0))
        }
    });

    let outcome = Orchestrator::with_runner(test_config(dir.path()), Arc::new(runner))
        .run_with_status(&suite, Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.aggregate.len(), 2);
    assert_eq!(outcome.aggregate.passes()[0].output, "healthy.png");

    let failure = &outcome.aggregate.failures()[0];
    assert_eq!(failure.output, "broken.png");
    assert_eq!(failure.score, None);
    assert!(failure.error.as_deref().unwrap().contains("improper image header"));
    assert_eq!(outcome.progress.completed(), outcome.progress.max());
}

#[tokio::test]
async fn test_two_cases_yield_exactly_two_entries() {
    let dir = tempfile::tempdir().unwrap();
    let suite = TestSuite::new(
        "pair",
        vec![single("a.xml", "a.png", None), single("b.xml", "b.png", None)],
    );
    let runner = rendering_runner(dir.path(), &suite).on(COMPARE, |args: &[String]| {
        // Both comparisons are in flight at the same time.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let score = if args[3] == "a.png" { "0.99" } else { "0.40" };
        let exit = if args[3] == "a.png" { 0 } else { 1 };
        Ok(comparator_output(score, exit))
    });

    let mut outcome = Orchestrator::with_runner(test_config(dir.path()), Arc::new(runner))
        .run_with_status(&suite, Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.aggregate.passes().len(), 1);
    assert_eq!(outcome.aggregate.failures().len(), 1);
    let report = outcome.aggregate.finalize(ReportLayout::Split);
    assert_eq!(report.entry_count(), 2);
}

#[tokio::test]
async fn test_many_workers_never_lose_results() {
    const CASES: usize = 24;

    for round in 0..5 {
        let dir = tempfile::tempdir().unwrap();
        let cases = (0..CASES)
            .map(|i| single(&format!("scene{i}.xml"), &format!("scene{i}.png"), None))
            .collect();
        let suite = TestSuite::new("wide", cases);

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let runner = rendering_runner(dir.path(), &suite).on(COMPARE, move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(comparator_output("0.5", 0))
        });
        let config = HarnessConfig {
            jobs: 0,
            result_buffer: 2,
            ..test_config(dir.path())
        };

        let outcome = Orchestrator::with_runner(config, Arc::new(runner))
            .run_with_status(&suite, Vec::new())
            .await
            .unwrap();

        assert_eq!(outcome.aggregate.len(), CASES, "round {round}");
        assert_eq!(calls.load(Ordering::SeqCst), CASES, "round {round}");
        assert_eq!(outcome.progress.completed(), (2 * CASES) as u64, "round {round}");
    }
}

#[tokio::test]
async fn test_relocation_into_outputs_root() {
    let dir = tempfile::tempdir().unwrap();
    let suite = TestSuite::new(
        "clipping",
        vec![TestCase::new(
            "examples/clipping_example/empty_box_clipped.xml",
            vec![
                ("empty_box_clipped_1.ppm.png", "ref/empty_box_clipped_1.ppm.png"),
                ("empty_box_clipped_2.ppm.png", "ref/empty_box_clipped_2.ppm.png"),
            ],
            Some("clipping".to_string()),
        )
        .unwrap()],
    );
    let runner =
        rendering_runner(dir.path(), &suite).on(COMPARE, |_| Ok(comparator_output("0.97", 0)));

    let outcome = Orchestrator::with_runner(test_config(dir.path()), Arc::new(runner.clone()))
        .run_with_status(&suite, Vec::new())
        .await
        .unwrap();

    for frame in ["1", "2"] {
        let name = format!("empty_box_clipped_{frame}.ppm.png");
        assert!(dir.path().join("test_outputs/clipping").join(&name).is_file());
        assert!(!dir.path().join(&name).exists());
        assert!(!dir.path().join(format!("empty_box_clipped_{frame}.ppm")).exists());
    }

    let outputs: Vec<_> = outcome.aggregate.passes().iter().map(|r| r.output.as_str()).collect();
    assert!(outputs.contains(&"test_outputs/clipping/empty_box_clipped_1.ppm.png"));
    assert!(runner
        .invocations_of(COMPARE)
        .iter()
        .all(|call| call.args[3].starts_with("test_outputs/clipping/")));
}

#[tokio::test]
async fn test_builtin_suites_share_artifact_names_safely() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SuiteRegistry::with_builtin();
    let suite = registry
        .select(&["culling_enabled".to_string(), "culling_disabled".to_string()])
        .unwrap();
    let runner =
        rendering_runner(dir.path(), &suite).on(COMPARE, |_| Ok(comparator_output("0.95", 0)));

    let outcome = Orchestrator::with_runner(test_config(dir.path()), Arc::new(runner.clone()))
        .run_with_status(&suite, Vec::new())
        .await
        .unwrap();

    let expected: usize = suite.cases().iter().map(|c| c.outputs().len()).sum();
    assert_eq!(outcome.aggregate.len(), expected);
    assert_eq!(outcome.aggregate.marker_count(), 0);
    assert!(dir.path().join("test_outputs/culling_enabled/empty_box_1.ppm.png").is_file());
    assert!(dir.path().join("test_outputs/culling_disabled/empty_box_1.ppm.png").is_file());
    assert_eq!(runner.invocations_of(RENDERER).len(), suite.len());
}

#[tokio::test]
async fn test_missing_renderer_aborts_before_launching() {
    let dir = tempfile::tempdir().unwrap();
    let suite = TestSuite::new("one", vec![single("a.xml", "a.png", None)]);
    let runner = ScriptedProcessRunner::new().on(COMPARE, |_| Ok(comparator_output("1", 0)));

    let error = Orchestrator::with_runner(test_config(dir.path()), Arc::new(runner.clone()))
        .run_with_status(&suite, Vec::new())
        .await
        .unwrap_err();

    match error {
        HarnessError::Launch { program, .. } => assert_eq!(program, RENDERER),
        other => panic!("Expected Launch error, got {:?}", other),
    }
    assert!(runner.invocations().is_empty());
}
