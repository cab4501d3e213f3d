//! Process runner
//!
//! Synchronous launching of the external renderer and comparator. The
//! calling thread blocks until the child exits; the orchestrator keeps
//! these calls on tokio's blocking pool.

pub mod scripted;

pub use scripted::ScriptedProcessRunner;

use crate::error::{HarnessError, HarnessResult};
use std::fmt::Debug;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured result of one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches an executable and waits for it.
///
/// Implementations must be usable from many worker threads at once.
pub trait ProcessRunner: Send + Sync + Debug {
    /// Run `program` with `args`, capturing both output streams in full.
    ///
    /// # Returns
    /// * `Ok(ProcessOutput)` - The child ran to completion, whatever its exit status
    /// * `Err(HarnessError::Launch)` - The executable could not be found or started
    /// * `Err(HarnessError::Timeout)` - The child overran the runner's timeout
    fn run(&self, program: &str, args: &[String]) -> HarnessResult<ProcessOutput>;

    /// Resolve `program` to the form passed to [`ProcessRunner::run`], failing
    /// with `HarnessError::Launch` if it cannot be run at all.
    fn resolve(&self, program: &str) -> HarnessResult<String> {
        Ok(program.to_string())
    }
}

/// Runs real processes with `std::process::Command`.
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

impl SystemProcessRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    /// Kill children that run longer than `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn wait_with_deadline(
        &self,
        program: &str,
        mut child: Child,
        timeout: Duration,
    ) -> HarnessResult<ProcessOutput> {
        // Drain both pipes concurrently so a chatty child cannot fill one and stall.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let started = Instant::now();
        let status: ExitStatus = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= timeout => {
                    warn!(program, ?timeout, "killing child process after timeout");
                    let _ = child.kill();
                    let _ = child.wait();
                    // Processes forked by the child may still hold the pipes open;
                    // the readers finish on their own once those exit.
                    drop(stdout_reader);
                    drop(stderr_reader);
                    return Err(HarnessError::Timeout {
                        program: program.to_string(),
                        timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => return Err(HarnessError::io(&self.working_dir, source)),
            }
        };

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout: join_pipe_reader(stdout_reader),
            stderr: join_pipe_reader(stderr_reader),
        })
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> HarnessResult<ProcessOutput> {
        debug!(program, ?args, "launching process");

        let child = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| HarnessError::Launch {
                program: program.to_string(),
                source,
            })?;

        let output = match self.timeout {
            Some(timeout) => self.wait_with_deadline(program, child, timeout)?,
            None => {
                let output = child
                    .wait_with_output()
                    .map_err(|source| HarnessError::io(&self.working_dir, source))?;
                ProcessOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
        };

        debug!(program, exit_code = ?output.exit_code, "process finished");
        Ok(output)
    }

    /// Look `program` up on `PATH`, or relative to the working directory when
    /// it contains a path separator. The result is absolute.
    fn resolve(&self, program: &str) -> HarnessResult<String> {
        let launch_error = |source: std::io::Error| HarnessError::Launch {
            program: program.to_string(),
            source,
        };
        let cwd = std::fs::canonicalize(&self.working_dir).map_err(launch_error)?;
        let resolved = which::which_in(program, std::env::var_os("PATH"), &cwd).map_err(|e| {
            launch_error(std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))
        })?;
        debug!(program, resolved = %resolved.display(), "resolved executable");
        Ok(resolved.to_string_lossy().into_owned())
    }
}

fn spawn_pipe_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

fn join_pipe_reader(reader: thread::JoinHandle<Vec<u8>>) -> String {
    let bytes = reader.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable_is_launch_error() {
        let runner = SystemProcessRunner::new(".");
        let result = runner.run("./definitely-not-a-rasterizer", &[]);
        match result {
            Err(HarnessError::Launch { program, .. }) => {
                assert_eq!(program, "./definitely-not-a-rasterizer")
            }
            other => panic!("Expected Launch error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_streams_and_exit_code() {
        let runner = SystemProcessRunner::new(".");
        let output = runner
            .run(
                "sh",
                &["-c".to_string(), "echo out; echo 0.998 1>&2; exit 1".to_string()],
            )
            .unwrap();

        assert_eq!(output.exit_code, Some(1));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "0.998");
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemProcessRunner::new(dir.path());
        runner
            .run("sh", &["-c".to_string(), "echo frame > frame.ppm.png".to_string()])
            .unwrap();
        assert!(dir.path().join("frame.ppm.png").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let runner =
            SystemProcessRunner::new(".").with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let result = runner.run("sh", &["-c".to_string(), "exec sleep 5".to_string()]);

        assert!(matches!(result, Err(HarnessError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_not_held_by_forked_children() {
        let runner =
            SystemProcessRunner::new(".").with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let result = runner.run("sh", &["-c".to_string(), "sleep 4; true".to_string()]);

        assert!(matches!(result, Err(HarnessError::Timeout { .. })));
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "timed out call took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_resolve_missing_executable() {
        let runner = SystemProcessRunner::new(".");
        assert!(matches!(
            runner.resolve("./definitely-not-a-rasterizer"),
            Err(HarnessError::Launch { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_relative_to_working_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("rasterizer");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolved = SystemProcessRunner::new(dir.path()).resolve("./rasterizer").unwrap();
        assert!(std::path::Path::new(&resolved).is_absolute());
        assert!(resolved.ends_with("rasterizer"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_not_hit() {
        let runner = SystemProcessRunner::new(".").with_timeout(Some(Duration::from_secs(5)));
        let output = runner
            .run("sh", &["-c".to_string(), "echo 0.5 1>&2".to_string()])
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stderr.trim(), "0.5");
    }
}
