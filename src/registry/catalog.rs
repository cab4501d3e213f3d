//! Built-in scene catalog and TOML catalog loading.
//!
//! Catalog files look like this:
//!
//! ```toml
//! [[suite]]
//! name = "smoke"
//! output_dir = "smoke"
//!
//! [[suite.case]]
//! input = "scenes/empty_box.xml"
//! outputs = [
//!     { produced = "empty_box_1.ppm.png", expected = "ref/empty_box_1.ppm.png" },
//! ]
//! ```

use super::{ArtifactMapping, TestCase, TestSuite};
use crate::error::{HarnessError, HarnessResult};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "suite")]
    suites: Vec<SuiteEntry>,
}

#[derive(Debug, Deserialize)]
struct SuiteEntry {
    name: String,
    #[serde(default)]
    output_dir: Option<String>,
    #[serde(default, rename = "case")]
    cases: Vec<CaseEntry>,
}

#[derive(Debug, Deserialize)]
struct CaseEntry {
    input: String,
    #[serde(default)]
    output_dir: Option<String>,
    outputs: Vec<OutputEntry>,
}

#[derive(Debug, Deserialize)]
struct OutputEntry {
    produced: String,
    expected: String,
}

/// Parse suites from the text of a TOML catalog.
pub fn parse_catalog(text: &str) -> HarnessResult<Vec<TestSuite>> {
    let file: CatalogFile = toml::from_str(text)?;
    file.suites
        .into_iter()
        .map(|suite| {
            let cases = suite
                .cases
                .into_iter()
                .map(|case| {
                    let output_dir = case.output_dir.or_else(|| suite.output_dir.clone());
                    TestCase::new(
                        case.input,
                        case.outputs.into_iter().map(|o| (o.produced, o.expected)),
                        output_dir,
                    )
                })
                .collect::<HarnessResult<Vec<_>>>()?;
            Ok(TestSuite::new(suite.name, cases))
        })
        .collect()
}

pub fn load_catalog(path: &Path) -> HarnessResult<Vec<TestSuite>> {
    let text = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    parse_catalog(&text)
}

/// Frame suffixes of a multi-frame scene.
enum Frames<'a> {
    Numbered(&'a [&'a str]),
    Single,
}

fn scene(
    input: String,
    stem: &str,
    expected_dir: &str,
    frames: Frames<'_>,
    output_dir: &str,
) -> TestCase {
    let outputs: Vec<(String, String)> = match frames {
        Frames::Numbered(suffixes) => suffixes
            .iter()
            .map(|suffix| {
                let produced = format!("{stem}_{suffix}.ppm.png");
                let expected = format!("{expected_dir}/{produced}");
                (produced, expected)
            })
            .collect(),
        Frames::Single => {
            let produced = format!("{stem}.ppm.png");
            let expected = format!("{expected_dir}/{produced}");
            vec![(produced, expected)]
        }
    };

    // Built-in tables always declare at least one frame with unique names.
    TestCase {
        input,
        outputs: outputs
            .into_iter()
            .map(|(produced, expected)| ArtifactMapping { produced, expected })
            .collect(),
        output_dir: Some(output_dir.to_string()),
    }
}

const BOX_FRAMES: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8", "example"];
const BRAZIL_FRAMES: &[&str] = &["1", "2", "final"];
const TWO_FRAMES: &[&str] = &["1", "2"];
const FOUR_FRAMES: &[&str] = &["1", "2", "3", "4"];

fn culling_suite(name: &str, mode: &str, with_iceland: bool) -> TestSuite {
    let inputs = format!("examples/culling_{mode}_inputs");
    let outputs = format!("examples/culling_{mode}_outputs");
    let dir = format!("culling_{mode}");

    let mut scenes: Vec<(&str, &str, Frames<'_>)> = vec![
        ("empty_box", "empty_box", Frames::Numbered(BOX_FRAMES)),
        ("filled_box", "filled_box", Frames::Numbered(BOX_FRAMES)),
        ("flag_brazil", "flag_brazil", Frames::Numbered(BRAZIL_FRAMES)),
    ];
    if with_iceland {
        scenes.push(("flag_iceland", "flag_iceland", Frames::Numbered(BRAZIL_FRAMES)));
    }
    scenes.extend([
        ("flag_turkey", "flag_turkey", Frames::Numbered(TWO_FRAMES)),
        ("flag_turkey_alternative", "flag_turkey_alt", Frames::Numbered(TWO_FRAMES)),
        ("horse_and_mug", "horse_and_mug", Frames::Numbered(FOUR_FRAMES)),
        ("sample", "sample", Frames::Single),
    ]);

    let cases = scenes
        .into_iter()
        .map(|(scene_name, stem, frames)| {
            scene(
                format!("{inputs}/{scene_name}.xml"),
                stem,
                &format!("{outputs}/{scene_name}"),
                frames,
                &dir,
            )
        })
        .collect();
    TestSuite::new(name, cases)
}

fn clipping_suite() -> TestSuite {
    let base = "examples/clipping_example";
    TestSuite::new(
        "clipping",
        vec![scene(
            format!("{base}/empty_box_clipped.xml"),
            "empty_box_clipped",
            base,
            Frames::Numbered(TWO_FRAMES),
            "clipping",
        )],
    )
}

fn orthographic_suite() -> TestSuite {
    let base = "examples/different_projection_type_example";
    let dir = "different_projection_types";
    let cases = [
        ("flag_turkey", "flag_turkey_orthographic", Frames::Single),
        ("flag_turkey", "flag_turkey_perspective", Frames::Single),
        ("horse_and_mug", "horse_and_mug_orthographic", Frames::Numbered(FOUR_FRAMES)),
        ("horse_and_mug", "horse_and_mug_perspective", Frames::Numbered(FOUR_FRAMES)),
    ]
    .into_iter()
    .map(|(folder, stem, frames)| {
        let expected_dir = format!("{base}/{folder}");
        scene(
            format!("{expected_dir}/{stem}.xml"),
            stem,
            &expected_dir,
            frames,
            dir,
        )
    })
    .collect();
    TestSuite::new("orthographic", cases)
}

/// The built-in suites, in default run order.
pub fn builtin_suites() -> Vec<TestSuite> {
    vec![
        clipping_suite(),
        culling_suite("culling_enabled", "enabled", true),
        culling_suite("culling_disabled", "disabled", false),
        orthographic_suite(),
    ]
}
