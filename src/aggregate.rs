//! Result aggregation and the persisted report.

use crate::error::{HarnessError, HarnessResult};
use crate::metric::ComparisonMetric;
use crate::result::{TestResult, Verdict};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

/// Shape of the report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLayout {
    /// `{"passes": [...], "failures": [...]}`
    #[default]
    Split,
    /// `{"results": [...]}`, every entry tagged with its verdict.
    Combined,
}

/// One record of the report file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub input: String,
    pub output: String,
    /// `null` for failure markers.
    #[serde(with = "score_format")]
    pub score: Option<f64>,
    pub metric: ComparisonMetric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scores are JSON numbers, except non-finite ones (PSNR of identical
/// images is `inf`), which JSON cannot hold: those are written as the
/// strings `"inf"`, `"-inf"` and `"nan"`.
mod score_format {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(score: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match score {
            None => serializer.serialize_none(),
            Some(value) if value.is_finite() => serializer.serialize_some(value),
            Some(value) if value.is_nan() => serializer.serialize_some("nan"),
            Some(value) if value.is_sign_positive() => serializer.serialize_some("inf"),
            Some(_) => serializer.serialize_some("-inf"),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<RawScore>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawScore::Number(value)) => Ok(Some(value)),
            Some(RawScore::Text(text)) => match text.as_str() {
                "inf" => Ok(Some(f64::INFINITY)),
                "-inf" => Ok(Some(f64::NEG_INFINITY)),
                "nan" => Ok(Some(f64::NAN)),
                _ => Err(D::Error::custom(format!("invalid score {text:?}"))),
            },
        }
    }
}

impl ReportEntry {
    fn from_result(result: &TestResult, with_verdict: bool) -> Self {
        Self {
            input: result.input.clone(),
            output: result.output.clone(),
            score: result.score,
            metric: result.metric,
            verdict: with_verdict.then_some(result.verdict),
            error: result.error.clone(),
        }
    }
}

/// The serialized run outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Split {
        passes: Vec<ReportEntry>,
        failures: Vec<ReportEntry>,
    },
    Combined {
        results: Vec<ReportEntry>,
    },
}

impl Report {
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> HarnessResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write the report, creating missing parent directories.
    pub fn write_to(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }
        let mut text = self.to_json()?;
        text.push('\n');
        std::fs::write(path, text).map_err(|e| HarnessError::io(path, e))
    }

    pub fn read_from(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn entry_count(&self) -> usize {
        match self {
            Report::Split { passes, failures } => passes.len() + failures.len(),
            Report::Combined { results } => results.len(),
        }
    }
}

/// Descending by score, stable for ties; unscored markers sort last.
fn by_score_descending(a: &Option<f64>, b: &Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_by_score(results: &mut [TestResult]) {
    results.sort_by(|a, b| by_score_descending(&a.score, &b.score));
}

/// Pass and fail collections of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultAggregate {
    passes: Vec<TestResult>,
    failures: Vec<TestResult>,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the collection matching the result's verdict.
    pub fn push(&mut self, result: TestResult) {
        match result.verdict {
            Verdict::Pass => self.passes.push(result),
            Verdict::Fail => self.failures.push(result),
        }
    }

    pub fn passes(&self) -> &[TestResult] {
        &self.passes
    }

    pub fn failures(&self) -> &[TestResult] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.passes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a result for this artifact has been collected.
    pub fn contains(&self, input: &str, output: &str) -> bool {
        self.passes
            .iter()
            .chain(&self.failures)
            .any(|result| result.input == input && result.output == output)
    }

    pub fn marker_count(&self) -> usize {
        self.failures.iter().filter(|r| r.is_marker()).count()
    }

    pub fn sort(&mut self) {
        sort_by_score(&mut self.passes);
        sort_by_score(&mut self.failures);
    }

    /// The scored failure furthest from its reference, judged by its metric's direction.
    pub fn least_similar_failure(&self) -> Option<&TestResult> {
        self.failures
            .iter()
            .filter_map(|result| result.score.map(|score| (result, score)))
            .min_by(|(a, a_score), (b, b_score)| {
                let a_key = if a.metric.higher_is_similar() { *a_score } else { -a_score };
                let b_key = if b.metric.higher_is_similar() { *b_score } else { -b_score };
                a_key.total_cmp(&b_key)
            })
            .map(|(result, _)| result)
    }

    /// Sort both collections and build the report in the requested layout.
    pub fn finalize(&mut self, layout: ReportLayout) -> Report {
        self.sort();
        match layout {
            ReportLayout::Split => Report::Split {
                passes: self.passes.iter().map(|r| ReportEntry::from_result(r, false)).collect(),
                failures: self
                    .failures
                    .iter()
                    .map(|r| ReportEntry::from_result(r, false))
                    .collect(),
            },
            ReportLayout::Combined => {
                let mut combined: Vec<TestResult> =
                    self.passes.iter().chain(self.failures.iter()).cloned().collect();
                sort_by_score(&mut combined);
                Report::Combined {
                    results: combined
                        .iter()
                        .map(|r| ReportEntry::from_result(r, true))
                        .collect(),
                }
            }
        }
    }
}
