//! Harness configuration
//!
//! Everything a run needs besides the suite selection's test data. Loaded
//! from a TOML file; every key is optional and command line flags are
//! applied on top by the binary.
//!
//! ```toml
//! renderer = "./build/rasterizer"
//! compare = "magick-compare"
//! metric = "SSIM"
//! jobs = 4
//! report_layout = "combined"
//! suites = ["clipping", "orthographic"]
//! ```

use crate::aggregate::ReportLayout;
use crate::collector::ChannelConfig;
use crate::comparator::{ExitPolarity, NULL_SINK};
use crate::error::{HarnessError, HarnessResult};
use crate::metric::ComparisonMetric;
use crate::registry::catalog::load_catalog;
use crate::registry::SuiteRegistry;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Renderer executable, resolved relative to `work_dir` if it contains a separator.
    pub renderer: String,
    /// Image comparison executable.
    pub compare: String,
    pub metric: ComparisonMetric,
    pub exit_polarity: ExitPolarity,
    /// Where the comparator writes its diff image; `null:` discards it.
    pub discard_target: String,
    /// Directory the renderer runs in and writes its artifacts to.
    pub work_dir: PathBuf,
    /// Relocation root, relative to `work_dir`.
    pub outputs_root: PathBuf,
    pub report_path: PathBuf,
    pub report_layout: ReportLayout,
    /// Maximum number of concurrently running test cases. `0` lifts the limit.
    pub jobs: usize,
    pub progress_interval_ms: u64,
    /// Kill child processes that run longer than this.
    pub process_timeout_secs: Option<u64>,
    /// Capacity of the result channel. `0` makes it unbounded.
    pub result_buffer: usize,
    /// Suites to run; empty runs every registered suite.
    pub suites: Vec<String>,
    /// Extra TOML catalogs registered after the built-in suites.
    pub catalogs: Vec<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            renderer: "./rasterizer".to_string(),
            compare: "compare".to_string(),
            metric: ComparisonMetric::default(),
            exit_polarity: ExitPolarity::default(),
            discard_target: NULL_SINK.to_string(),
            work_dir: PathBuf::from("."),
            outputs_root: PathBuf::from("test_outputs"),
            report_path: PathBuf::from("tests.json"),
            report_layout: ReportLayout::default(),
            jobs: num_cpus::get(),
            progress_interval_ms: 500,
            process_timeout_secs: None,
            result_buffer: 1024,
            suites: Vec::new(),
            catalogs: Vec::new(),
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(text: &str) -> HarnessResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.renderer.trim().is_empty() {
            return Err(HarnessError::Config("renderer must not be empty".to_string()));
        }
        if self.compare.trim().is_empty() {
            return Err(HarnessError::Config("compare must not be empty".to_string()));
        }
        if self.discard_target.is_empty() {
            return Err(HarnessError::Config(
                "discard_target must not be empty".to_string(),
            ));
        }
        if self.progress_interval_ms == 0 {
            return Err(HarnessError::Config(
                "progress_interval_ms must be positive".to_string(),
            ));
        }
        if self.process_timeout_secs == Some(0) {
            return Err(HarnessError::Config(
                "process_timeout_secs must be positive".to_string(),
            ));
        }
        if self.outputs_root.is_absolute() {
            return Err(HarnessError::Config(
                "outputs_root must be relative to work_dir".to_string(),
            ));
        }
        Ok(())
    }

    /// `None` when concurrency is unlimited.
    pub fn max_parallel(&self) -> Option<usize> {
        (self.jobs > 0).then_some(self.jobs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }

    pub fn channel_config(&self) -> ChannelConfig {
        match self.result_buffer {
            0 => ChannelConfig::unbounded(),
            size => ChannelConfig::bounded(size),
        }
    }

    /// Built-in suites plus every configured catalog.
    pub fn registry(&self) -> HarnessResult<SuiteRegistry> {
        let mut registry = SuiteRegistry::with_builtin();
        for path in &self.catalogs {
            for suite in load_catalog(path)? {
                registry.register(suite)?;
            }
        }
        Ok(registry)
    }

    /// Whether the comparator writes its diff image to a real file that must be cleaned up.
    pub fn discard_is_file(&self) -> bool {
        !self.discard_target.contains(':')
    }
}
