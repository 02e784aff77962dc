// src/results.rs

//! Grading results.
//!
//! Each result is appended to only by the component that produced it and
//! then handed upward read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{NetworkExpectation, TestStage};

/// HTTP exchange captured for a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkActual {
    pub url: String,
    pub method: String,
    pub request: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_number: u32,
    pub action: String,
    pub passed: bool,

    pub expected_client_console: Option<String>,
    pub actual_client_console: Option<String>,
    /// `None` = not checked
    pub client_console_matched: Option<bool>,

    pub expected_server_console: Option<String>,
    pub actual_server_console: Option<String>,
    pub server_console_matched: Option<bool>,

    pub expected_network: Option<NetworkExpectation>,
    pub actual_network: Option<NetworkActual>,
    pub network_matched: Option<bool>,

    /// In validation order
    pub messages: Vec<String>,
}

impl StageResult {
    pub fn new(stage: &TestStage) -> Self {
        Self {
            stage_number: stage.stage_number,
            action: stage
                .user_action
                .as_ref()
                .map(|a| a.kind.to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            passed: true,
            expected_client_console: stage.expected_client_console.clone(),
            actual_client_console: None,
            client_console_matched: None,
            expected_server_console: stage.expected_server_console.clone(),
            actual_server_console: None,
            server_console_matched: None,
            expected_network: stage.expected_network.clone(),
            actual_network: None,
            network_matched: None,
            messages: Vec::new(),
        }
    }

    /// Mark the stage failed and record why.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.passed = false;
        self.messages.push(message.into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub max_marks: f64,
    pub earned_marks: f64,
    pub passed: bool,
    pub summary: String,
    pub stage_results: Vec<StageResult>,
    /// Non-fatal problems met while executing
    pub errors: Vec<String>,
}

impl TestCaseResult {
    pub fn new(test_case_id: impl Into<String>, max_marks: f64) -> Self {
        Self {
            test_case_id: test_case_id.into(),
            max_marks,
            earned_marks: 0.0,
            passed: true,
            summary: String::new(),
            stage_results: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Zero-scoring result for a test case that never ran.
    pub fn not_run(test_case_id: impl Into<String>, max_marks: f64, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            summary: reason.into(),
            ..Self::new(test_case_id, max_marks)
        }
    }

    pub fn passed_stages(&self) -> usize {
        self.stage_results.iter().filter(|s| s.passed).count()
    }

    /// Proportional score: `max_marks * passed / total`, zero without stages.
    pub fn score(&mut self) {
        let total = self.stage_results.len();
        let passed = self.passed_stages();

        self.earned_marks = if total > 0 {
            self.max_marks * passed as f64 / total as f64
        } else {
            0.0
        };
        self.passed = self.passed && total > 0 && passed == total;
        self.summary = format!("Passed {}/{} stages", passed, total);
    }

    /// Abandon the remaining stages after an unexpected failure.
    pub fn abort(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.passed = false;
        self.earned_marks = 0.0;
        self.summary = format!(
            "Aborted after {}/{} stages: {}",
            self.passed_stages(),
            self.stage_results.len(),
            error
        );
        self.errors.push(format!("Execution error: {}", error));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteGradingResult {
    pub run_id: String,
    pub suite: String,
    pub total_max_marks: f64,
    pub total_earned_marks: f64,
    pub percentage: f64,
    pub test_case_results: Vec<TestCaseResult>,
    /// Suite-scope failures; each also has a zero-scoring test case result
    pub critical_errors: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl SuiteGradingResult {
    pub fn new(run_id: impl Into<String>, suite: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            suite: suite.into(),
            total_max_marks: 0.0,
            total_earned_marks: 0.0,
            percentage: 0.0,
            test_case_results: Vec::new(),
            critical_errors: Vec::new(),
            start_time: now,
            end_time: now,
        }
    }

    /// Fold a finished test case into the totals.
    ///
    /// Failed test cases still contribute their full allocation to the maximum.
    pub fn push(&mut self, result: TestCaseResult) {
        self.total_max_marks += result.max_marks;
        self.total_earned_marks += result.earned_marks;
        self.test_case_results.push(result);
    }

    pub fn finish(&mut self) {
        self.end_time = Utc::now();
        self.percentage = if self.total_max_marks > 0.0 {
            self.total_earned_marks / self.total_max_marks * 100.0
        } else {
            0.0
        };
    }
}
