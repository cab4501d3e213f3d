//! Test case registry
//!
//! Holds the catalog of scene inputs and the artifacts each one is expected
//! to produce, grouped into named suites.

pub mod catalog;

use crate::error::{HarnessError, HarnessResult};
use std::collections::HashSet;

/// One produced artifact and the golden reference it is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMapping {
    /// File name the renderer writes into its working directory.
    pub produced: String,
    /// Path of the reference image, relative to the working directory.
    pub expected: String,
}

/// A scene input plus its ordered artifact mapping.
///
/// Construction validates that the mapping is non-empty and that produced
/// names are unique, so every `TestCase` in circulation satisfies both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    input: String,
    outputs: Vec<ArtifactMapping>,
    output_dir: Option<String>,
}

impl TestCase {
    pub fn new<I, P, E>(
        input: impl Into<String>,
        outputs: I,
        output_dir: Option<String>,
    ) -> HarnessResult<Self>
    where
        I: IntoIterator<Item = (P, E)>,
        P: Into<String>,
        E: Into<String>,
    {
        let input = input.into();
        let outputs: Vec<ArtifactMapping> = outputs
            .into_iter()
            .map(|(produced, expected)| ArtifactMapping {
                produced: produced.into(),
                expected: expected.into(),
            })
            .collect();

        if outputs.is_empty() {
            return Err(HarnessError::InvalidTestCase {
                input,
                reason: "a test case must expect at least one output".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for mapping in &outputs {
            if !seen.insert(mapping.produced.as_str()) {
                return Err(HarnessError::InvalidTestCase {
                    reason: format!("duplicate produced artifact `{}`", mapping.produced),
                    input,
                });
            }
        }

        Ok(Self {
            input,
            outputs,
            output_dir,
        })
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn outputs(&self) -> &[ArtifactMapping] {
        &self.outputs
    }

    /// Subdirectory of the outputs root that artifacts are moved into, if any.
    pub fn output_dir(&self) -> Option<&str> {
        self.output_dir.as_deref()
    }

    /// Progress units this case contributes: one render plus one per artifact.
    pub fn progress_units(&self) -> u64 {
        1 + self.outputs.len() as u64
    }
}

/// Named, ordered sequence of test cases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestSuite {
    name: String,
    cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Total progress units of a run over this suite: `Σ(1 + |outputs|)`.
    pub fn max_progress(&self) -> u64 {
        self.cases.iter().map(TestCase::progress_units).sum()
    }

    /// Concatenate several suites into a single run list, keeping order.
    pub fn concat<'a>(name: impl Into<String>, suites: impl IntoIterator<Item = &'a TestSuite>) -> Self {
        let cases = suites
            .into_iter()
            .flat_map(|suite| suite.cases.iter().cloned())
            .collect();
        Self::new(name, cases)
    }
}

/// Registry of named suites.
///
/// The registry's responsibilities:
/// 1. Register suites under unique names
/// 2. Look suites up by name
/// 3. Build the run list for a selection of suite names
#[derive(Debug, Default)]
pub struct SuiteRegistry {
    suites: Vec<TestSuite>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self { suites: Vec::new() }
    }

    /// Registry preloaded with the built-in catalog.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for suite in catalog::builtin_suites() {
            // Built-in names are distinct, registration cannot collide.
            let _ = registry.register(suite);
        }
        registry
    }

    /// Register a suite.
    ///
    /// # Returns
    /// * `Ok(())` - The suite was added
    /// * `Err(HarnessError::Config)` - A suite with the same name already exists
    pub fn register(&mut self, suite: TestSuite) -> HarnessResult<()> {
        if self.get(suite.name()).is_some() {
            return Err(HarnessError::Config(format!(
                "suite `{}` is already registered",
                suite.name()
            )));
        }
        self.suites.push(suite);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TestSuite> {
        self.suites.iter().find(|suite| suite.name() == name)
    }

    /// Names of all registered suites in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.suites.iter().map(TestSuite::name).collect()
    }

    pub fn suite_count(&self) -> usize {
        self.suites.len()
    }

    /// Build one run list from the named suites.
    ///
    /// An empty selection means every registered suite, in registration order.
    ///
    /// # Example
    /// ```
    /// use raster_regress::registry::SuiteRegistry;
    ///
    /// let registry = SuiteRegistry::with_builtin();
    /// let run = registry.select(&["clipping".to_string()]).unwrap();
    /// assert_eq!(run.len(), 1);
    /// ```
    pub fn select(&self, names: &[String]) -> HarnessResult<TestSuite> {
        if names.is_empty() {
            return Ok(TestSuite::concat("all", &self.suites));
        }

        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let suite = self
                .get(name)
                .ok_or_else(|| HarnessError::UnknownSuite(name.clone()))?;
            selected.push(suite);
        }
        Ok(TestSuite::concat(names.join("+"), selected))
    }
}
