//! Per-artifact test results.

use crate::metric::ComparisonMetric;
use serde::{Deserialize, Serialize};

/// Pass/fail classification of one artifact comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Outcome of comparing one produced artifact against its reference.
///
/// `score` is `None` only for failure markers: artifacts whose comparison
/// never produced a number because the render, the artifact or the
/// comparator output was broken. Markers always carry an `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub input: String,
    pub output: String,
    pub score: Option<f64>,
    pub metric: ComparisonMetric,
    pub verdict: Verdict,
    pub error: Option<String>,
}

impl TestResult {
    pub fn scored(
        input: impl Into<String>,
        output: impl Into<String>,
        score: f64,
        metric: ComparisonMetric,
        verdict: Verdict,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            score: Some(score),
            metric,
            verdict,
            error: None,
        }
    }

    pub fn failure_marker(
        input: impl Into<String>,
        output: impl Into<String>,
        metric: ComparisonMetric,
        error: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            score: None,
            metric,
            verdict: Verdict::Fail,
            error: Some(error.into()),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn is_marker(&self) -> bool {
        self.score.is_none()
    }
}
