// src/model.rs

//! In-memory test suite definition.
//!
//! These types are what a suite loader produces and what the engine
//! consumes. The engine never mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A loaded suite: which test cases exist and how many marks each is worth.
#[derive(Debug, Clone, Serialize)]
pub struct TestSuite {
    pub name: String,
    pub path: PathBuf,
    /// In execution order
    pub test_cases: Vec<TestCaseEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseEntry {
    pub id: String,
    pub marks: f64,
}

/// One fully parsed test case.
#[derive(Debug, Clone, Serialize)]
pub struct TestCase {
    pub id: String,
    pub path: PathBuf,
    pub marks: f64,
    pub config: TestCaseConfig,
    /// Ascending by `stage_number`
    pub stages: Vec<TestStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCaseConfig {
    pub timeout_seconds: u64,

    /// Base URL the submission talks to (e.g. "http://localhost:5235")
    pub domain: String,

    pub grade_content: GradeContent,
}

impl Default for TestCaseConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
            domain: String::new(),
            grade_content: GradeContent::Client,
        }
    }
}

/// Which side of the submission a test case exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GradeContent {
    #[default]
    #[serde(alias = "Client")]
    Client,
    #[serde(alias = "Server")]
    Server,
    #[serde(alias = "Both")]
    Both,
}

impl GradeContent {
    pub fn includes_client(self) -> bool {
        matches!(self, GradeContent::Client | GradeContent::Both)
    }

    pub fn includes_server(self) -> bool {
        matches!(self, GradeContent::Server | GradeContent::Both)
    }
}

/// One scripted step: an action plus whatever should be observed after it.
///
/// `None` or empty expectations mean "do not validate this dimension".
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestStage {
    /// 1-based
    pub stage_number: u32,
    pub user_action: Option<UserAction>,
    pub expected_client_console: Option<String>,
    pub expected_server_console: Option<String>,
    pub expected_network: Option<NetworkExpectation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAction {
    pub kind: ActionKind,
    /// Only meaningful for `Input`
    pub input: Option<String>,
}

impl UserAction {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, input: None }
    }

    pub fn input(text: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Input,
            input: Some(text.into()),
        }
    }
}

/// Scripted action kinds.
///
/// Anything else a suite author writes is kept as `Unrecognized` and
/// treated as a no-op by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    StartClient,
    StartServer,
    Input,
    CloseClient,
    CloseServer,
    Unrecognized(String),
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "startclient" => ActionKind::StartClient,
            "startserver" => ActionKind::StartServer,
            "input" => ActionKind::Input,
            "closeclient" => ActionKind::CloseClient,
            "closeserver" => ActionKind::CloseServer,
            _ => ActionKind::Unrecognized(raw),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(raw: &str) -> Self {
        ActionKind::from(raw.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::StartClient => f.write_str("StartClient"),
            ActionKind::StartServer => f.write_str("StartServer"),
            ActionKind::Input => f.write_str("Input"),
            ActionKind::CloseClient => f.write_str("CloseClient"),
            ActionKind::CloseServer => f.write_str("CloseServer"),
            ActionKind::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Expected HTTP exchange for a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkExpectation {
    pub url: String,
    pub method: String,
    pub request: String,
    pub response: String,
}

impl Default for NetworkExpectation {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            request: String::new(),
            response: String::new(),
        }
    }
}

impl NetworkExpectation {
    /// True when no field would actually be checked.
    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty()
            && self.request.trim().is_empty()
            && self.response.trim().is_empty()
    }
}
