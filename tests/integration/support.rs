//! Shared fixtures: a scripted renderer that writes the artifacts a suite
//! declares, and a cloneable sink for the progress line.

use raster_regress::prelude::*;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const RENDERER: &str = "./rasterizer";
pub const COMPARE: &str = "compare";

/// Runner whose renderer writes every produced artifact of the case named
/// by its first argument, plus the `.ppm` intermediates.
pub fn rendering_runner(work_dir: &Path, suite: &TestSuite) -> ScriptedProcessRunner {
    let mut artifacts: HashMap<String, Vec<String>> = HashMap::new();
    for case in suite.cases() {
        artifacts.insert(
            case.input().to_string(),
            case.outputs().iter().map(|m| m.produced.clone()).collect(),
        );
    }
    let work_dir = work_dir.to_path_buf();

    ScriptedProcessRunner::new().on(RENDERER, move |args: &[String]| {
        for name in artifacts.get(&args[0]).into_iter().flatten() {
            std::fs::write(work_dir.join(name), b"png").unwrap();
            if let Some(intermediate) = name.strip_suffix(".png").filter(|s| s.ends_with(".ppm")) {
                std::fs::write(work_dir.join(intermediate), b"ppm").unwrap();
            }
        }
        Ok(ProcessOutput::default())
    })
}

pub fn comparator_output(stderr: &str, exit_code: i32) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(exit_code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn test_config(work_dir: &Path) -> HarnessConfig {
    HarnessConfig {
        work_dir: work_dir.to_path_buf(),
        progress_interval_ms: 5,
        jobs: 4,
        ..HarnessConfig::default()
    }
}

/// `Write` sink whose clones share one buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
