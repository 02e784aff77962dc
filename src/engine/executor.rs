// src/engine/executor.rs

//! Runs the stages of one test case and turns them into a score.
//!
//! Setup (capture hand-off, database reset) and the stage loop run under one
//! guard: a panic or the test case timeout aborts this test case only, and
//! every supervised process is stopped before `execute` returns.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn, Instrument};

use crate::capture::NetworkCapture;
use crate::config::GradingConfig;
use crate::database::DatabaseSetup;
use crate::engine::dispatch::{StageDispatcher, Targets};
use crate::engine::events::{GradingEvent, GradingEventKind};
use crate::engine::sink::ReportSink;
use crate::model::TestCase;
use crate::results::TestCaseResult;
use crate::run_id::RunId;
use crate::supervisor::ProcessSupervisor;

pub struct TestCaseExecutor {
    config: GradingConfig,
    supervisor: ProcessSupervisor,
    capture: Box<dyn NetworkCapture>,
    database: Option<DatabaseSetup>,
}

impl TestCaseExecutor {
    pub fn new(config: GradingConfig, capture: Box<dyn NetworkCapture>) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(&config),
            config,
            capture,
            database: None,
        }
    }

    /// Reset the database before the first stage of every test case.
    pub fn with_database(mut self, database: DatabaseSetup) -> Self {
        self.database = Some(database);
        self
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    /// Names of processes still registered with the supervisor.
    pub fn active_processes(&self) -> Vec<&str> {
        self.supervisor.names()
    }

    pub async fn execute(
        &mut self,
        test_case: &TestCase,
        targets: &Targets,
        run_id: &RunId,
        sink: &mut dyn ReportSink,
    ) -> TestCaseResult {
        let span = tracing::info_span!("test_case", id = %test_case.id);

        async {
            let mut result = TestCaseResult::new(&test_case.id, test_case.marks);
            info!(stages = test_case.stages.len(), marks = test_case.marks, "test case started");

            let limit = Duration::from_secs(test_case.config.timeout_seconds.max(1));
            let guarded = async {
                self.capture.begin_test_case(&test_case.id);
                reset_database(self.database.as_ref(), &mut result).await;
                self.run_stages(test_case, targets, run_id, &mut result, sink).await;
            };

            let outcome = timeout(limit, AssertUnwindSafe(guarded).catch_unwind()).await;
            match outcome {
                Ok(Ok(())) => result.score(),
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    error!(error = %message, "test case aborted");
                    result.abort(message);
                }
                Err(_) => {
                    error!(timeout_s = limit.as_secs(), "test case timed out");
                    result.abort(format!("test case timed out after {}s", limit.as_secs()));
                }
            }

            self.release().await;

            info!(
                earned = result.earned_marks,
                max = result.max_marks,
                summary = %result.summary,
                "test case finished"
            );
            result
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &mut self,
        test_case: &TestCase,
        targets: &Targets,
        run_id: &RunId,
        result: &mut TestCaseResult,
        sink: &mut dyn ReportSink,
    ) {
        let between = self.config.settle.between_stages();
        let mut dispatcher =
            StageDispatcher::new(&self.config, &mut self.supervisor, self.capture.as_mut());

        for (i, stage) in test_case.stages.iter().enumerate() {
            if i > 0 {
                sleep(between).await;
            }

            let stage_result = dispatcher.run(stage, targets).await;

            sink.emit(GradingEvent::new(
                run_id,
                GradingEventKind::StageCompleted {
                    test_case_id: test_case.id.clone(),
                    stage: stage_result.clone(),
                },
            ));
            result.stage_results.push(stage_result);
        }
    }

    async fn release(&mut self) {
        StageDispatcher::new(&self.config, &mut self.supervisor, self.capture.as_mut())
            .release()
            .await;
    }
}

/// Borrows only the database setup so the future stays `Send`.
async fn reset_database(database: Option<&DatabaseSetup>, result: &mut TestCaseResult) {
    let Some(database) = database else {
        return;
    };

    if let Err(e) = database.run().await {
        warn!(error = %format!("{:#}", e), "database reset failed, continuing");
        result
            .errors
            .push(format!("Database reset failed (non-critical): {:#}", e));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
