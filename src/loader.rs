// src/loader.rs

//! Suite definitions on disk.
//!
//! A suite is a folder:
//!
//! library-suite/
//!   suite.yaml          name + ordered test cases with marks
//!   TC01/testcase.yaml  config + stages
//!   TC02/testcase.yaml
//!
//! `suite.yaml` may be omitted (or list no test cases); every folder holding a
//! `testcase.yaml` is then a test case, ordered by folder name.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::model::{
    ActionKind, NetworkExpectation, TestCase, TestCaseConfig, TestCaseEntry, TestStage, TestSuite,
    UserAction,
};
use crate::util::read_to_string;

pub const SUITE_FILE: &str = "suite.yaml";
pub const TEST_CASE_FILE: &str = "testcase.yaml";

/// Where suite definitions come from.
pub trait SuiteSource {
    fn load_suite(&self, path: &Path) -> Result<TestSuite>;

    /// Parse one test case from its folder. Stages come back ordered.
    fn parse_test_case(&self, folder: &Path, entry: &TestCaseEntry) -> Result<TestCase>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SuiteFile {
    name: Option<String>,
    test_cases: Vec<TestCaseEntry>,
}

#[derive(Debug, Deserialize)]
struct TestCaseFile {
    #[serde(flatten)]
    config: TestCaseConfig,

    #[serde(default)]
    stages: Vec<StageFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageFile {
    stage: u32,

    #[serde(default)]
    action: Option<ActionKind>,

    #[serde(default)]
    input: Option<String>,

    #[serde(default)]
    client_console: Option<String>,

    #[serde(default)]
    server_console: Option<String>,

    #[serde(default)]
    network: Option<NetworkExpectation>,
}

impl From<StageFile> for TestStage {
    fn from(raw: StageFile) -> Self {
        TestStage {
            stage_number: raw.stage,
            user_action: raw.action.map(|kind| UserAction {
                kind,
                input: raw.input,
            }),
            expected_client_console: raw.client_console,
            expected_server_console: raw.server_console,
            expected_network: raw.network,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlSuiteLoader;

impl YamlSuiteLoader {
    pub fn new() -> Self {
        Self
    }
}

fn read_test_case_file(folder: &Path) -> Result<TestCaseFile> {
    let path = folder.join(TEST_CASE_FILE);
    let raw = read_to_string(&path)?;
    serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {:?}", path))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarksOnly {
    marks: Option<f64>,
}

/// Marks of a discovered test case. A file that does not parse still counts
/// with the default 1.0; the parse error surfaces when the test case runs.
fn discovered_marks(file: &Path) -> f64 {
    let parsed = std::fs::read_to_string(file)
        .ok()
        .and_then(|raw| serde_yaml::from_str::<MarksOnly>(&raw).ok());

    match parsed.and_then(|m| m.marks) {
        Some(marks) if marks.is_finite() && marks >= 0.0 => marks,
        Some(marks) => {
            warn!(file = %file.display(), marks, "invalid marks, using 1.0");
            1.0
        }
        None => {
            debug!(file = %file.display(), "no readable marks, using 1.0");
            1.0
        }
    }
}

fn discover_test_cases(suite_dir: &Path) -> Result<Vec<TestCaseEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(suite_dir).min_depth(2).max_depth(2).sort_by_file_name() {
        let entry = entry?;
        if entry.file_name() != TEST_CASE_FILE {
            continue;
        }

        let Some(folder) = entry.path().parent() else {
            continue;
        };

        let id = folder
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .context("Test case folder has no name")?;

        let marks = discovered_marks(&entry.path());
        entries.push(TestCaseEntry { id, marks });
    }

    Ok(entries)
}

impl SuiteSource for YamlSuiteLoader {
    fn load_suite(&self, path: &Path) -> Result<TestSuite> {
        if !path.is_dir() {
            bail!("Suite folder not found: {}", path.display());
        }

        let suite_file = path.join(SUITE_FILE);
        let file = if suite_file.is_file() {
            let raw = read_to_string(&suite_file)?;
            serde_yaml::from_str::<SuiteFile>(&raw)
                .with_context(|| format!("Failed to parse {:?}", suite_file))?
        } else {
            SuiteFile::default()
        };

        let test_cases = if file.test_cases.is_empty() {
            discover_test_cases(path)?
        } else {
            file.test_cases
        };

        if test_cases.is_empty() {
            bail!("No test cases found in {}", path.display());
        }

        let mut seen = HashSet::new();
        for tc in &test_cases {
            if !seen.insert(tc.id.as_str()) {
                bail!("Duplicate test case id: {}", tc.id);
            }
            if !tc.marks.is_finite() || tc.marks < 0.0 {
                bail!("Test case {} has invalid marks: {}", tc.id, tc.marks);
            }
        }

        let name = file.name.unwrap_or_else(|| {
            path.file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "suite".to_string())
        });

        Ok(TestSuite {
            name,
            path: path.to_path_buf(),
            test_cases,
        })
    }

    fn parse_test_case(&self, folder: &Path, entry: &TestCaseEntry) -> Result<TestCase> {
        let file = read_test_case_file(folder)?;

        let mut stages: Vec<TestStage> = file.stages.into_iter().map(TestStage::from).collect();
        stages.sort_by_key(|s| s.stage_number);

        if let Some(pair) = stages.windows(2).find(|w| w[0].stage_number == w[1].stage_number) {
            bail!(
                "Test case {} defines stage {} twice",
                entry.id,
                pair[0].stage_number
            );
        }

        if let Some(stage) = stages.iter().find(|s| s.stage_number == 0) {
            bail!("Test case {} has stage {}; stages are numbered from 1", entry.id, stage.stage_number);
        }

        Ok(TestCase {
            id: entry.id.clone(),
            path: folder.to_path_buf(),
            marks: entry.marks,
            config: file.config,
            stages,
        })
    }
}
