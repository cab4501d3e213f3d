//! Progress output and report files produced by complete runs.

use super::support::{comparator_output, rendering_runner, test_config, SharedBuffer, COMPARE};
use raster_regress::prelude::*;
use std::sync::Arc;

fn frames_suite() -> TestSuite {
    TestSuite::new(
        "frames",
        vec![
            TestCase::new(
                "horse_and_mug.xml",
                vec![
                    ("horse_and_mug_1.ppm.png", "ref/horse_and_mug_1.ppm.png"),
                    ("horse_and_mug_2.ppm.png", "ref/horse_and_mug_2.ppm.png"),
                    ("horse_and_mug_3.ppm.png", "ref/horse_and_mug_3.ppm.png"),
                ],
                None,
            )
            .unwrap(),
            TestCase::new("sample.xml", vec![("sample.ppm.png", "ref/sample.ppm.png")], None).unwrap(),
        ],
    )
}

fn scoring_runner(dir: &std::path::Path, suite: &TestSuite) -> ScriptedProcessRunner {
    rendering_runner(dir, suite).on(COMPARE, |args: &[String]| match args[3].as_str() {
        "horse_and_mug_1.ppm.png" => Ok(comparator_output("0.999", 0)),
        "horse_and_mug_2.ppm.png" => Ok(comparator_output("0.42", 1)),
        "horse_and_mug_3.ppm.png" => Ok(comparator_output("0.87", 0)),
        _ => Ok(comparator_output("not a number", 2)),
    })
}

#[tokio::test]
async fn test_progress_line_ends_at_one_hundred_percent() {
    let dir = tempfile::tempdir().unwrap();
    let suite = frames_suite();
    assert_eq!(suite.max_progress(), 6);

    let status = SharedBuffer::default();
    let outcome = Orchestrator::with_runner(
        test_config(dir.path()),
        Arc::new(scoring_runner(dir.path(), &suite)),
    )
    .run_with_status(&suite, status.clone())
    .await
    .unwrap();

    assert_eq!(outcome.progress.completed(), 6);
    let text = status.contents();
    assert!(text.ends_with("\rProgress: 100.00% (6/6)\n"), "got {text:?}");
}

#[tokio::test]
async fn test_split_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let suite = frames_suite();
    let report_path = dir.path().join("tests.json");

    let mut outcome = Orchestrator::with_runner(
        test_config(dir.path()),
        Arc::new(scoring_runner(dir.path(), &suite)),
    )
    .run_with_status(&suite, Vec::new())
    .await
    .unwrap();
    outcome.aggregate.finalize(ReportLayout::Split).write_to(&report_path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    let passes = value["passes"].as_array().unwrap();
    let failures = value["failures"].as_array().unwrap();

    let pass_scores: Vec<f64> = passes.iter().map(|e| e["score"].as_f64().unwrap()).collect();
    assert_eq!(pass_scores, vec![0.999, 0.87]);

    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["score"], 0.42);
    assert_eq!(failures[0]["metric"], "SSIM");
    assert!(failures[1]["score"].is_null());
    assert_eq!(failures[1]["output"], "sample.ppm.png");
    assert!(failures[1]["error"].as_str().unwrap().contains("not a number"));
}

#[tokio::test]
async fn test_combined_report_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let suite = frames_suite();
    let report_path = dir.path().join("reports/combined.json");

    let mut outcome = Orchestrator::with_runner(
        test_config(dir.path()),
        Arc::new(scoring_runner(dir.path(), &suite)),
    )
    .run_with_status(&suite, Vec::new())
    .await
    .unwrap();
    let report = outcome.aggregate.finalize(ReportLayout::Combined);
    report.write_to(&report_path).unwrap();

    let read_back = Report::read_from(&report_path).unwrap();
    assert_eq!(read_back.entry_count(), 4);
    match read_back {
        Report::Combined { results } => {
            let verdicts: Vec<_> = results.iter().map(|e| e.verdict).collect();
            assert_eq!(
                verdicts,
                vec![
                    Some(Verdict::Pass),
                    Some(Verdict::Pass),
                    Some(Verdict::Fail),
                    Some(Verdict::Fail),
                ]
            );
            assert!(results[3].score.is_none());
        }
        other => panic!("Expected combined report, got {:?}", other),
    }
}

#[tokio::test]
async fn test_metric_label_travels_to_report() {
    let dir = tempfile::tempdir().unwrap();
    let suite = TestSuite::new(
        "rmse",
        vec![TestCase::new("sample.xml", vec![("sample.ppm.png", "ref/sample.ppm.png")], None).unwrap()],
    );
    let runner = rendering_runner(dir.path(), &suite).on(COMPARE, |args: &[String]| {
        assert_eq!(args[1], "RMSE");
        Ok(comparator_output("12.5", 0))
    });
    let config = HarnessConfig {
        metric: ComparisonMetric::Rmse,
        ..test_config(dir.path())
    };

    let outcome = Orchestrator::with_runner(config, Arc::new(runner))
        .run_with_status(&suite, Vec::new())
        .await
        .unwrap();
    assert_eq!(outcome.aggregate.passes()[0].metric, ComparisonMetric::Rmse);
    assert_eq!(outcome.aggregate.passes()[0].score, Some(12.5));
}
