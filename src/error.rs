//! Error type shared by every stage of the harness.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while loading a catalog, running a case or writing a report.
///
/// Per-case errors (`ScoreParse`, `MissingArtifact`, renderer `Launch`) never
/// escape a worker: they are turned into failure markers in the report.
/// The orchestrator only returns the variants that make the whole run
/// meaningless, such as a missing executable found during pre-flight.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The executable could not be found or started.
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The comparator's error stream was not a floating point literal.
    #[error("comparator output is not a score: {text:?}")]
    ScoreParse { text: String },

    /// The renderer did not produce an artifact the test case expects.
    #[error("expected artifact was not produced: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// A child process overran the configured process timeout and was killed.
    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report serialization failed: {0}")]
    Report(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown test suite `{0}`")]
    UnknownSuite(String),

    #[error("unknown comparison metric `{0}`")]
    UnknownMetric(String),

    /// A worker or collector task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// A test case violates the catalog invariants (empty or duplicate outputs).
    #[error("invalid test case `{input}`: {reason}")]
    InvalidTestCase { input: String, reason: String },
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error ends the remaining work of the worker that hit it.
    ///
    /// A missing artifact only spoils one comparison; everything else that
    /// can happen inside a worker abandons the rest of the case.
    pub fn aborts_case(&self) -> bool {
        !matches!(self, HarnessError::MissingArtifact { .. })
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
