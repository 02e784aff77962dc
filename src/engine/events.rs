use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::results::{StageResult, SuiteGradingResult, TestCaseResult};
use crate::run_id::RunId;

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradingEventKind {
    SuiteStarted {
        suite: String,
        test_cases: usize,
    },
    StageCompleted {
        test_case_id: String,
        stage: StageResult,
    },
    TestCaseFinished {
        result: TestCaseResult,
    },
    CriticalError {
        test_case_id: String,
        message: String,
    },
    SuiteFinished {
        result: SuiteGradingResult,
    },
}

/// A complete snapshot handed to a report sink. Sinks never see partial state.
#[derive(Debug, Serialize, Clone)]
pub struct GradingEvent {
    pub run_id: RunId,
    #[serde(flatten)]
    pub kind: GradingEventKind,
    pub timestamp: DateTime<Utc>,
}

impl GradingEvent {
    pub fn new(run_id: &RunId, kind: GradingEventKind) -> Self {
        Self {
            run_id: run_id.clone(),
            kind,
            timestamp: Utc::now(),
        }
    }
}
