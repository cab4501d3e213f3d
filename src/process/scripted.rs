//! Scripted process runner for tests and dry runs.

use super::{ProcessOutput, ProcessRunner};
use crate::error::{HarnessError, HarnessResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

type Handler = Arc<dyn Fn(&[String]) -> HarnessResult<ProcessOutput> + Send + Sync>;

/// One recorded call to [`ScriptedProcessRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Process runner that answers from per-program handlers instead of
/// launching anything.
///
/// Handlers receive the argument list and may perform side effects (for
/// instance writing the artifacts a renderer would produce). Programs with
/// no handler fail with `HarnessError::Launch`, like a missing executable.
#[derive(Clone, Default)]
pub struct ScriptedProcessRunner {
    handlers: HashMap<String, Handler>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler used whenever `program` is run.
    pub fn on<F>(mut self, program: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[String]) -> HarnessResult<ProcessOutput> + Send + Sync + 'static,
    {
        self.handlers.insert(program.into(), Arc::new(handler));
        self
    }

    /// Every call made so far, in call order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Calls made to one program, in call order.
    pub fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|call| call.program == program)
            .collect()
    }
}

impl fmt::Debug for ScriptedProcessRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut programs: Vec<_> = self.handlers.keys().collect();
        programs.sort();
        f.debug_struct("ScriptedProcessRunner")
            .field("programs", &programs)
            .finish()
    }
}

impl ProcessRunner for ScriptedProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> HarnessResult<ProcessOutput> {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
            });
        }

        match self.handlers.get(program) {
            Some(handler) => handler(args),
            None => Err(not_scripted(program)),
        }
    }

    fn resolve(&self, program: &str) -> HarnessResult<String> {
        if self.handlers.contains_key(program) {
            Ok(program.to_string())
        } else {
            Err(not_scripted(program))
        }
    }
}

fn not_scripted(program: &str) -> HarnessError {
    HarnessError::Launch {
        program: program.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no scripted handler for program",
        ),
    }
}
