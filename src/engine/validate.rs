use anyhow::Result;
use std::path::Path;

use crate::config::ExecutableConfig;
use crate::engine::ValidationResult;
use crate::loader::SuiteSource;
use crate::model::{ActionKind, TestCase};

/// Check a suite definition without launching anything.
///
/// Only I/O failures surface as `Err`; every problem with the suite itself is
/// collected into the returned `ValidationResult`.
pub fn validate_suite(
    source: &dyn SuiteSource,
    suite_path: &Path,
    client: &ExecutableConfig,
    server: &ExecutableConfig,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();

    let suite = match source.load_suite(suite_path) {
        Ok(s) => s,
        Err(e) => {
            result.push_error("SUITE_LOAD_FAILED", format!("{:#}", e));
            return Ok(result);
        }
    };

    for entry in &suite.test_cases {
        let folder = suite.path.join(&entry.id);

        if !folder.is_dir() {
            result.push_error(
                "TESTCASE_FOLDER_MISSING",
                format!("Test case folder not found: {}", folder.display()),
            );
            continue;
        }

        match source.parse_test_case(&folder, entry) {
            Ok(tc) => {
                validate_stages(&tc, &mut result);
                validate_executables(&tc, client, server, &mut result);
            }
            Err(e) => result.push_error(
                "TESTCASE_PARSE_FAILED",
                format!("{}: {:#}", entry.id, e),
            ),
        }
    }

    Ok(result)
}

/* ---------------- stages ---------------- */

fn validate_stages(tc: &TestCase, result: &mut ValidationResult) {
    if tc.stages.is_empty() {
        result.push_error("STAGES_EMPTY", format!("{}: no stages defined", tc.id));
        return;
    }

    for (i, stage) in tc.stages.iter().enumerate() {
        let expected = i as u32 + 1;
        if stage.stage_number != expected {
            result.push_error(
                "STAGE_NUMBERING",
                format!(
                    "{}: expected stage {} but found stage {}",
                    tc.id, expected, stage.stage_number
                ),
            );
            break;
        }
    }

    for stage in &tc.stages {
        let Some(action) = &stage.user_action else {
            continue;
        };

        match &action.kind {
            ActionKind::Input if action.input.is_none() => result.push_error(
                "INPUT_MISSING_TEXT",
                format!("{}: stage {} sends input but has none", tc.id, stage.stage_number),
            ),
            ActionKind::Unrecognized(raw) => result.push_error(
                "ACTION_UNRECOGNIZED",
                format!("{}: stage {} has unknown action '{}'", tc.id, stage.stage_number, raw),
            ),
            _ => {}
        }
    }

    if tc.config.timeout_seconds == 0 {
        result.push_error("TIMEOUT_ZERO", format!("{}: timeout_seconds must be > 0", tc.id));
    }
}

/* ---------------- executables ---------------- */

fn validate_executables(
    tc: &TestCase,
    client: &ExecutableConfig,
    server: &ExecutableConfig,
    result: &mut ValidationResult,
) {
    let starts = |kind: ActionKind| {
        tc.stages
            .iter()
            .any(|s| s.user_action.as_ref().is_some_and(|a| a.kind == kind))
    };

    let content = tc.config.grade_content;

    if starts(ActionKind::StartClient) {
        if !content.includes_client() {
            result.push_error(
                "CLIENT_NOT_GRADED",
                format!("{}: starts the client but grades {:?} only", tc.id, content),
            );
        }
        check_executable("CLIENT_EXECUTABLE", "Client", client, result);
    }

    if starts(ActionKind::StartServer) {
        if !content.includes_server() {
            result.push_error(
                "SERVER_NOT_GRADED",
                format!("{}: starts the server but grades {:?} only", tc.id, content),
            );
        }
        check_executable("SERVER_EXECUTABLE", "Server", server, result);
    }
}

fn check_executable(
    code: &'static str,
    name: &str,
    exe: &ExecutableConfig,
    result: &mut ValidationResult,
) {
    match &exe.path {
        None => {
            if !result.errors.iter().any(|e| e.code == code) {
                result.push_error(code, format!("{} executable path not provided", name));
            }
        }
        Some(path) if !path.is_file() => {
            if !result.errors.iter().any(|e| e.code == code) {
                result.push_error(
                    code,
                    format!("{} executable not found: {}", name, path.display()),
                );
            }
        }
        Some(_) => {}
    }
}
