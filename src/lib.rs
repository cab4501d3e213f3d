pub mod aggregate;
pub mod collector;
pub mod comparator;
pub mod config;
pub mod error;
pub mod metric;
pub mod orchestrator;
pub mod prelude;
pub mod process;
pub mod progress;
pub mod registry;
pub mod result;
pub mod worker;

pub use aggregate::{Report, ReportLayout, ResultAggregate};
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use orchestrator::{Orchestrator, RunOutcome};
