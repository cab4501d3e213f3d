//! Comparator
//!
//! Runs the external diff tool for one artifact pair:
//!
//! ```text
//! <compare> -metric <METRIC> <expected> <actual> <discard>
//! ```
//!
//! The tool prints its score on the error stream and signals similarity
//! through its exit status.

use crate::error::{HarnessError, HarnessResult};
use crate::metric::ComparisonMetric;
use crate::process::ProcessRunner;
use crate::result::{TestResult, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// ImageMagick's null image sink: the diff image is thrown away.
pub const NULL_SINK: &str = "null:";

/// How the diff tool's exit status maps onto a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolarity {
    /// Exit status 0 means the images are similar (ImageMagick `compare`).
    #[default]
    ZeroIsPass,
    /// Exit status 0 means the images differ.
    ZeroIsFail,
}

impl ExitPolarity {
    /// A child killed before reporting a status is always a failure.
    pub fn classify(self, exit_code: Option<i32>) -> Verdict {
        match (self, exit_code) {
            (_, None) => Verdict::Fail,
            (ExitPolarity::ZeroIsPass, Some(0)) => Verdict::Pass,
            (ExitPolarity::ZeroIsPass, Some(_)) => Verdict::Fail,
            (ExitPolarity::ZeroIsFail, Some(0)) => Verdict::Fail,
            (ExitPolarity::ZeroIsFail, Some(_)) => Verdict::Pass,
        }
    }
}

/// Parse the comparator's error stream as a single floating point literal.
pub fn parse_score(text: &str) -> HarnessResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| HarnessError::ScoreParse {
            text: text.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct Comparator {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    discard_target: String,
    polarity: ExitPolarity,
}

impl Comparator {
    pub fn new(runner: Arc<dyn ProcessRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            discard_target: NULL_SINK.to_string(),
            polarity: ExitPolarity::default(),
        }
    }

    pub fn with_discard_target(mut self, discard_target: impl Into<String>) -> Self {
        self.discard_target = discard_target.into();
        self
    }

    pub fn with_polarity(mut self, polarity: ExitPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Argument list for one comparison, in the order the tool expects.
    pub fn arguments(&self, expected: &str, actual: &str, metric: ComparisonMetric) -> Vec<String> {
        vec![
            "-metric".to_string(),
            metric.as_str().to_string(),
            expected.to_string(),
            actual.to_string(),
            self.discard_target.clone(),
        ]
    }

    /// Compare `actual` against `expected` for the scene `input`.
    ///
    /// # Returns
    /// * `Ok(TestResult)` - Scored result; its verdict follows the exit polarity
    /// * `Err(HarnessError::Launch)` - The diff tool could not be started
    /// * `Err(HarnessError::ScoreParse)` - The error stream was not a number
    pub fn compare(
        &self,
        input: &str,
        expected: &str,
        actual: &str,
        metric: ComparisonMetric,
    ) -> HarnessResult<TestResult> {
        let output = self
            .runner
            .run(&self.program, &self.arguments(expected, actual, metric))?;
        let score = parse_score(&output.stderr)?;
        let verdict = self.polarity.classify(output.exit_code);

        debug!(actual, %metric, score, ?verdict, "comparison finished");
        Ok(TestResult::scored(input, actual, score, metric, verdict))
    }
}
