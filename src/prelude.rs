//! Prelude for raster_regress
//!
//! Re-exports the run pipeline, its data types and the process seams for convenient use.

pub use crate::aggregate::{sort_by_score, Report, ReportEntry, ReportLayout, ResultAggregate};
pub use crate::comparator::{Comparator, ExitPolarity, NULL_SINK};
pub use crate::config::HarnessConfig;
pub use crate::error::{HarnessError, HarnessResult};
pub use crate::metric::ComparisonMetric;
pub use crate::orchestrator::{Orchestrator, RunOutcome};
pub use crate::registry::{ArtifactMapping, SuiteRegistry, TestCase, TestSuite};
pub use crate::result::{TestResult, Verdict};
pub use crate::worker::TestWorker;

// Process seams
pub use crate::process::{ProcessOutput, ProcessRunner, ScriptedProcessRunner, SystemProcessRunner};

// Result collection and progress
pub use crate::collector::{result_channel, spawn_collector, ChannelConfig, ResultReceiver, ResultSender};
pub use crate::progress::{ProgressCounter, ProgressReporter, ReporterHandle};
