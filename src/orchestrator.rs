//! Orchestrator
//!
//! Drives one run: resolves the executables, starts the progress reporter
//! and the result collector, runs every test case on the blocking pool and
//! joins everything back into a [`ResultAggregate`].

use crate::aggregate::ResultAggregate;
use crate::collector::{result_channel, spawn_collector};
use crate::comparator::Comparator;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::progress::{ProgressCounter, ProgressReporter};
use crate::registry::{TestCase, TestSuite};
use crate::result::TestResult;
use crate::worker::{intermediate_name, TestWorker};
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// What a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub aggregate: ResultAggregate,
    /// The run's counter; `completed() == max()` once every case finished.
    pub progress: ProgressCounter,
}

/// Group cases into lanes that must run one after another.
///
/// Every case renders into the same working directory, so two cases that
/// produce a file of the same name (or the same intermediate) would
/// overwrite each other's artifacts. Such cases share a lane and run in
/// catalog order; cases in different lanes run concurrently.
pub fn plan_lanes(cases: &[TestCase]) -> Vec<Vec<TestCase>> {
    let mut lanes: Vec<(HashSet<String>, Vec<TestCase>)> = Vec::new();

    for case in cases {
        let names: HashSet<String> = case
            .outputs()
            .iter()
            .flat_map(|mapping| {
                std::iter::once(mapping.produced.clone()).chain(intermediate_name(&mapping.produced))
            })
            .collect();

        let overlapping: Vec<usize> = lanes
            .iter()
            .enumerate()
            .filter(|(_, (lane_names, _))| !lane_names.is_disjoint(&names))
            .map(|(index, _)| index)
            .collect();

        match overlapping.split_first() {
            None => lanes.push((names, vec![case.clone()])),
            Some((&first, rest)) => {
                // `rest` is ascending and above `first`, so removing back to front keeps indices valid.
                for &index in rest.iter().rev() {
                    let (merged_names, merged_cases) = lanes.remove(index);
                    lanes[first].0.extend(merged_names);
                    lanes[first].1.extend(merged_cases);
                }
                lanes[first].0.extend(names);
                lanes[first].1.push(case.clone());
            }
        }
    }

    lanes.into_iter().map(|(_, cases)| cases).collect()
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: HarnessConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl Orchestrator {
    /// Orchestrator that launches real processes inside `config.work_dir`.
    pub fn new(config: HarnessConfig) -> Self {
        let runner = SystemProcessRunner::new(&config.work_dir).with_timeout(config.process_timeout());
        Self::with_runner(config, Arc::new(runner))
    }

    pub fn with_runner(config: HarnessConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Resolve both executables before anything is launched.
    ///
    /// Failing here is fatal to the whole run.
    pub fn preflight(&self) -> HarnessResult<(String, String)> {
        let renderer = self.runner.resolve(&self.config.renderer)?;
        let compare = self.runner.resolve(&self.config.compare)?;
        info!(%renderer, %compare, "executables resolved");
        Ok((renderer, compare))
    }

    /// Run `suite`, drawing progress on stdout.
    pub async fn run(&self, suite: &TestSuite) -> HarnessResult<RunOutcome> {
        self.run_with_status(suite, std::io::stdout()).await
    }

    /// Run `suite`, drawing progress on `status`.
    pub async fn run_with_status<W: Write + Send + 'static>(
        &self,
        suite: &TestSuite,
        status: W,
    ) -> HarnessResult<RunOutcome> {
        let (renderer, compare) = self.preflight()?;

        let progress = ProgressCounter::new(suite.max_progress());
        let comparator = Comparator::new(Arc::clone(&self.runner), compare)
            .with_discard_target(self.config.discard_target.clone())
            .with_polarity(self.config.exit_polarity);
        let worker = Arc::new(TestWorker::new(
            Arc::clone(&self.runner),
            renderer,
            comparator,
            self.config.metric,
            &self.config.work_dir,
            &self.config.outputs_root,
            progress.clone(),
        ));

        let lanes = plan_lanes(suite.cases());
        info!(
            suite = suite.name(),
            cases = suite.len(),
            lanes = lanes.len(),
            max_progress = progress.max(),
            jobs = ?self.config.max_parallel(),
            "starting run"
        );

        let reporter =
            ProgressReporter::new(progress.clone(), self.config.progress_interval(), status).spawn();
        let (sender, receiver) = result_channel(&self.config.channel_config());
        let collector = spawn_collector(receiver);
        let limiter = self.config.max_parallel().map(|jobs| Arc::new(Semaphore::new(jobs)));

        let tasks: Vec<_> = lanes
            .iter()
            .cloned()
            .map(|lane| {
                let worker = Arc::clone(&worker);
                let sender = sender.clone();
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(limiter) => limiter.acquire_owned().await.ok(),
                        None => None,
                    };
                    tokio::task::spawn_blocking(move || worker.run_lane(&lane, &sender)).await
                })
            })
            .collect();
        drop(sender);

        let mut failed_lanes = Vec::new();
        let finished = futures::future::join_all(tasks).await;
        for (index, (joined, lane)) in finished.into_iter().zip(lanes).enumerate() {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(join_error)) | Err(join_error) => {
                    error!(lane = index, error = %join_error, "worker task failed");
                    failed_lanes.push((lane, join_error.to_string()));
                }
            }
        }

        let collected = collector.await;
        let mut aggregate = match collected {
            Ok(aggregate) => aggregate,
            Err(e) => {
                reporter.stop().await;
                return Err(HarnessError::Task(format!("result collector: {e}")));
            }
        };
        if !failed_lanes.is_empty() {
            self.mark_undelivered(&worker, &failed_lanes, &mut aggregate);
            progress.advance(progress.max().saturating_sub(progress.completed()));
        }
        reporter.stop().await;

        let expected: usize = suite.cases().iter().map(|case| case.outputs().len()).sum();
        if aggregate.len() != expected {
            warn!(expected, collected = aggregate.len(), "result count mismatch");
        }
        info!(
            passes = aggregate.passes().len(),
            failures = aggregate.failures().len(),
            markers = aggregate.marker_count(),
            "run finished"
        );

        self.remove_discard_file();
        Ok(RunOutcome { aggregate, progress })
    }

    /// Report every artifact of a crashed lane that never reached the collector.
    fn mark_undelivered(
        &self,
        worker: &TestWorker,
        failed_lanes: &[(Vec<TestCase>, String)],
        aggregate: &mut ResultAggregate,
    ) {
        for (lane, cause) in failed_lanes {
            for case in lane {
                for mapping in case.outputs() {
                    let output = worker.report_path(case, mapping);
                    if !aggregate.contains(case.input(), &output) {
                        aggregate.push(TestResult::failure_marker(
                            case.input(),
                            output,
                            self.config.metric,
                            format!("worker task failed: {cause}"),
                        ));
                    }
                }
            }
        }
    }

    fn remove_discard_file(&self) {
        if !self.config.discard_is_file() {
            return;
        }
        let path = self.config.work_dir.join(&self.config.discard_target);
        match std::fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "removed diff image"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(path = %path.display(), %error, "could not remove diff image"),
        }
    }
}
