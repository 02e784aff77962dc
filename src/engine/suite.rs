// src/engine/suite.rs

//! Grades every test case of a suite, one after another.
//!
//! A broken test case (missing folder, unparsable definition) is recorded as a
//! critical error with a zero score and the suite moves on. Only a suite that
//! cannot be loaded at all fails the run.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::ExecutableConfig;
use crate::engine::dispatch::Targets;
use crate::engine::events::{GradingEvent, GradingEventKind};
use crate::engine::executor::TestCaseExecutor;
use crate::engine::sink::ReportSink;
use crate::loader::SuiteSource;
use crate::model::{TestCase, TestCaseEntry};
use crate::results::{SuiteGradingResult, TestCaseResult};
use crate::run_id::RunId;

pub struct SuiteExecutor<'a> {
    source: &'a dyn SuiteSource,
    executor: TestCaseExecutor,
    client: ExecutableConfig,
    server: ExecutableConfig,
}

impl<'a> SuiteExecutor<'a> {
    pub fn new(source: &'a dyn SuiteSource, executor: TestCaseExecutor) -> Self {
        Self {
            source,
            executor,
            client: ExecutableConfig::default(),
            server: ExecutableConfig::default(),
        }
    }

    pub fn client(mut self, client: ExecutableConfig) -> Self {
        self.client = client;
        self
    }

    pub fn server(mut self, server: ExecutableConfig) -> Self {
        self.server = server;
        self
    }

    pub fn executor(&self) -> &TestCaseExecutor {
        &self.executor
    }

    pub async fn run(&mut self, suite_path: &Path, sink: &mut dyn ReportSink) -> Result<SuiteGradingResult> {
        let suite = self
            .source
            .load_suite(suite_path)
            .with_context(|| format!("Failed to load suite {}", suite_path.display()))?;

        let run_id = RunId::new();
        let mut report = SuiteGradingResult::new(run_id.to_string(), suite.name.clone());

        info!(
            run_id = %run_id,
            suite = %suite.name,
            test_cases = suite.test_cases.len(),
            "suite started"
        );
        sink.emit(GradingEvent::new(
            &run_id,
            GradingEventKind::SuiteStarted {
                suite: suite.name.clone(),
                test_cases: suite.test_cases.len(),
            },
        ));

        for entry in &suite.test_cases {
            let result = match self.prepare(&suite.path, entry) {
                Ok(test_case) => {
                    let targets = self.targets_for(&test_case, &suite.path);
                    self.executor.execute(&test_case, &targets, &run_id, sink).await
                }
                Err(message) => {
                    error!(test_case = %entry.id, error = %message, "test case not run");
                    report.critical_errors.push(message.clone());
                    sink.emit(GradingEvent::new(
                        &run_id,
                        GradingEventKind::CriticalError {
                            test_case_id: entry.id.clone(),
                            message: message.clone(),
                        },
                    ));
                    TestCaseResult::not_run(&entry.id, entry.marks, message)
                }
            };

            sink.emit(GradingEvent::new(
                &run_id,
                GradingEventKind::TestCaseFinished {
                    result: result.clone(),
                },
            ));
            report.push(result);
        }

        report.finish();

        info!(
            earned = report.total_earned_marks,
            max = report.total_max_marks,
            percentage = report.percentage,
            critical_errors = report.critical_errors.len(),
            "suite finished"
        );
        sink.emit(GradingEvent::new(
            &run_id,
            GradingEventKind::SuiteFinished {
                result: report.clone(),
            },
        ));

        Ok(report)
    }

    fn prepare(&self, suite_dir: &Path, entry: &TestCaseEntry) -> Result<TestCase, String> {
        let folder = suite_dir.join(&entry.id);
        if !folder.is_dir() {
            return Err(format!("Test case folder not found: {}", folder.display()));
        }

        self.source
            .parse_test_case(&folder, entry)
            .map_err(|e| format!("Failed to parse test case {}: {:#}", entry.id, e))
    }

    /// Executables for the sides `test_case` grades, with working directories
    /// resolved.
    fn targets_for(&self, test_case: &TestCase, suite_dir: &Path) -> Targets {
        let content = test_case.config.grade_content;

        Targets {
            client: if content.includes_client() {
                resolve(&self.client, suite_dir)
            } else {
                ExecutableConfig::default()
            },
            server: if content.includes_server() {
                resolve(&self.server, suite_dir)
            } else {
                ExecutableConfig::default()
            },
        }
    }
}

/// Working directory: explicit, else the executable's folder, else the suite.
fn resolve(exe: &ExecutableConfig, suite_dir: &Path) -> ExecutableConfig {
    let working_dir = exe.working_dir.clone().or_else(|| {
        exe.path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty() && p.is_dir())
            .map(Path::to_path_buf)
            .or_else(|| Some(suite_dir.to_path_buf()))
    });

    ExecutableConfig {
        path: exe.path.clone(),
        working_dir,
        args: exe.args.clone(),
    }
}
