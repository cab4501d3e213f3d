//! Test worker
//!
//! Runs one test case end to end: render once, then compare every expected
//! artifact in declared order. All calls block; the orchestrator runs
//! workers on the blocking pool.

use crate::collector::ResultSender;
use crate::comparator::Comparator;
use crate::error::{HarnessError, HarnessResult};
use crate::metric::ComparisonMetric;
use crate::process::ProcessRunner;
use crate::progress::ProgressCounter;
use crate::registry::{ArtifactMapping, TestCase};
use crate::result::TestResult;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Name of the intermediate file the renderer leaves next to an image
/// artifact: `frame.ppm` for `frame.ppm.png`. `None` for single-extension names.
pub fn intermediate_name(produced: &str) -> Option<String> {
    let stem = Path::new(produced).file_stem()?;
    Path::new(stem).extension()?;
    Some(stem.to_string_lossy().into_owned())
}

#[derive(Debug, Clone)]
pub struct TestWorker {
    runner: Arc<dyn ProcessRunner>,
    renderer: String,
    comparator: Comparator,
    metric: ComparisonMetric,
    work_dir: PathBuf,
    outputs_root: PathBuf,
    progress: ProgressCounter,
}

impl TestWorker {
    /// `work_dir` is where the renderer writes artifacts; `outputs_root` is
    /// relative to it.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        renderer: impl Into<String>,
        comparator: Comparator,
        metric: ComparisonMetric,
        work_dir: impl Into<PathBuf>,
        outputs_root: impl Into<PathBuf>,
        progress: ProgressCounter,
    ) -> Self {
        Self {
            runner,
            renderer: renderer.into(),
            comparator,
            metric,
            work_dir: work_dir.into(),
            outputs_root: outputs_root.into(),
            progress,
        }
    }

    pub fn progress(&self) -> &ProgressCounter {
        &self.progress
    }

    /// Run one case and return its results in artifact order.
    pub fn run_case(&self, case: &TestCase) -> Vec<TestResult> {
        let mut results = Vec::with_capacity(case.outputs().len());
        self.run_case_with(case, |result| results.push(result));
        results
    }

    /// Run several cases one after another, delivering results to the collector.
    pub fn run_lane(&self, cases: &[TestCase], sender: &ResultSender) {
        for case in cases {
            self.run_case_with(case, |result| {
                if let Err(error) = sender.send_blocking(result) {
                    error!(%error, "dropping result");
                }
            });
        }
    }

    /// Run one case, handing each result to `deliver` as soon as it exists.
    ///
    /// Every case yields exactly one result per expected artifact and
    /// advances the progress counter by exactly `case.progress_units()`,
    /// whatever fails along the way.
    pub fn run_case_with<F: FnMut(TestResult)>(&self, case: &TestCase, mut deliver: F) {
        let input = case.input();
        self.clear_stale(case);
        let rendered = self.runner.run(&self.renderer, &[input.to_string()]);
        self.progress.increment();

        match rendered {
            Ok(output) if !output.success() => {
                warn!(input, exit_code = ?output.exit_code, "renderer exited unsuccessfully");
            }
            Ok(_) => debug!(input, "render finished"),
            Err(error) => {
                error!(input, %error, "render failed, abandoning case");
                self.abandon(case, 0, &error, &mut deliver);
                return;
            }
        }

        let mut passed = 0usize;
        for (index, mapping) in case.outputs().iter().enumerate() {
            let outcome = self.compare_artifact(case, mapping);
            self.progress.increment();

            match outcome {
                Ok(result) => {
                    passed += usize::from(result.is_pass());
                    deliver(result);
                }
                Err(error) => {
                    warn!(input, artifact = %mapping.produced, %error, "comparison failed");
                    deliver(TestResult::failure_marker(
                        input,
                        self.report_path(case, mapping),
                        self.metric,
                        error.to_string(),
                    ));
                    if error.aborts_case() {
                        self.abandon(case, index + 1, &error, &mut deliver);
                        return;
                    }
                }
            }
        }

        info!(input, passed, total = case.outputs().len(), "case finished");
    }

    /// Report the artifacts from `first` onwards as not compared and count them as done.
    /// Delete artifacts an earlier render left in the working directory.
    fn clear_stale(&self, case: &TestCase) {
        for mapping in case.outputs() {
            let names = std::iter::once(mapping.produced.clone()).chain(intermediate_name(&mapping.produced));
            for name in names {
                let path = self.work_dir.join(name);
                match fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "removed stale artifact"),
                    Err(error) if error.kind() == ErrorKind::NotFound => {}
                    Err(error) => warn!(path = %path.display(), %error, "could not remove stale artifact"),
                }
            }
        }
    }

    fn abandon<F: FnMut(TestResult)>(
        &self,
        case: &TestCase,
        first: usize,
        cause: &HarnessError,
        deliver: &mut F,
    ) {
        let skipped = &case.outputs()[first..];
        self.progress.advance(skipped.len() as u64);
        for mapping in skipped {
            deliver(TestResult::failure_marker(
                case.input(),
                self.report_path(case, mapping),
                self.metric,
                format!("not compared: {cause}"),
            ));
        }
    }

    /// Path of the artifact as it appears in the report, relative to the working directory.
    pub(crate) fn report_path(&self, case: &TestCase, mapping: &ArtifactMapping) -> String {
        match case.output_dir() {
            Some(dir) => self
                .outputs_root
                .join(dir)
                .join(&mapping.produced)
                .to_string_lossy()
                .into_owned(),
            None => mapping.produced.clone(),
        }
    }

    fn compare_artifact(
        &self,
        case: &TestCase,
        mapping: &ArtifactMapping,
    ) -> HarnessResult<TestResult> {
        let produced = self.work_dir.join(&mapping.produced);
        if !produced.is_file() {
            return Err(HarnessError::MissingArtifact { path: produced });
        }

        if let Some(dir) = case.output_dir() {
            self.relocate(&mapping.produced, dir)?;
        }

        self.comparator.compare(
            case.input(),
            &mapping.expected,
            &self.report_path(case, mapping),
            self.metric,
        )
    }

    /// Move an artifact into `<outputs_root>/<dir>` and delete its intermediate file.
    fn relocate(&self, produced: &str, dir: &str) -> HarnessResult<()> {
        let target_dir = self.work_dir.join(&self.outputs_root).join(dir);
        fs::create_dir_all(&target_dir).map_err(|e| HarnessError::io(&target_dir, e))?;

        if let Some(intermediate) = intermediate_name(produced) {
            let path = self.work_dir.join(intermediate);
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed intermediate file"),
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(HarnessError::io(path, error)),
            }
        }

        let source = self.work_dir.join(produced);
        let target = target_dir.join(produced);
        fs::rename(&source, &target).map_err(|e| HarnessError::io(source, e))
    }
}
