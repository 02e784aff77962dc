// src/engine/dispatch.rs

//! One stage: perform the scripted action, let output settle, capture it and
//! validate every enabled expectation.

use std::path::Path;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::capture::NetworkCapture;
use crate::compare::{compare, Comparison};
use crate::config::{ExecutableConfig, GradingConfig, SettleStrategy};
use crate::model::{ActionKind, NetworkExpectation, TestStage, UserAction};
use crate::results::{NetworkActual, StageResult};
use crate::supervisor::{ProcessSupervisor, CLIENT, SERVER};

/// Executables a test case may launch. A side the test case does not grade
/// is left at its default (no path).
#[derive(Debug, Clone, Default)]
pub struct Targets {
    pub client: ExecutableConfig,
    pub server: ExecutableConfig,
}

pub struct StageDispatcher<'a> {
    config: &'a GradingConfig,
    supervisor: &'a mut ProcessSupervisor,
    capture: &'a mut dyn NetworkCapture,
}

impl<'a> StageDispatcher<'a> {
    pub fn new(
        config: &'a GradingConfig,
        supervisor: &'a mut ProcessSupervisor,
        capture: &'a mut dyn NetworkCapture,
    ) -> Self {
        Self {
            config,
            supervisor,
            capture,
        }
    }

    /// Run one stage to completion. Never fails: every problem ends up as a
    /// message on the returned result.
    pub async fn run(&mut self, stage: &TestStage, targets: &Targets) -> StageResult {
        let mut result = StageResult::new(stage);
        let limit = self.config.stage_timeout();

        info!(stage = stage.stage_number, action = %result.action, "stage started");

        let finished = timeout(limit, self.execute(stage, targets, &mut result)).await;
        if finished.is_err() {
            error!(stage = stage.stage_number, timeout_s = limit.as_secs(), "stage timed out");
            result.fail(format!("Stage timed out after {}s", limit.as_secs()));
        }

        if result.passed {
            info!(stage = stage.stage_number, "stage validation: PASS");
        } else {
            warn!(
                stage = stage.stage_number,
                messages = %result.messages.join(", "),
                "stage validation: FAIL"
            );
        }

        result
    }

    /// Stop every process and network capture.
    pub async fn release(&mut self) {
        self.supervisor.stop_all().await;
        self.capture.stop();
    }

    async fn execute(&mut self, stage: &TestStage, targets: &Targets, result: &mut StageResult) {
        if let Some(action) = &stage.user_action {
            self.apply(action, targets, result).await;
        }

        self.settle().await;
        self.capture_output(result);
        self.validate(stage, result);
    }

    async fn apply(&mut self, action: &UserAction, targets: &Targets, result: &mut StageResult) {
        match &action.kind {
            ActionKind::StartClient => {
                self.start(CLIENT, &targets.client, result).await;
            }

            ActionKind::StartServer => {
                let started = self.start(SERVER, &targets.server, result).await;

                if started && self.supervisor.is_running(CLIENT) {
                    let ports = self.config.capture_ports;
                    if !self.capture.start(ports.client, ports.server) {
                        warn!(
                            client_port = ports.client,
                            server_port = ports.server,
                            "network capture did not start"
                        );
                    }
                }
            }

            ActionKind::Input => {
                if !self.supervisor.is_running(CLIENT) {
                    result.fail("Cannot send input: client not running");
                    return;
                }

                let text = action.input.as_deref().unwrap_or_default();
                info!(input = text, "sending input to client");
                if !self.supervisor.send_input(CLIENT, text).await {
                    result.fail("Cannot send input: client not running");
                }
            }

            // Capture covers the client/server pair; losing either side ends it.
            ActionKind::CloseClient => {
                info!("stopping client");
                self.supervisor.stop(CLIENT).await;
                self.capture.stop();
            }

            ActionKind::CloseServer => {
                info!("stopping server");
                self.supervisor.stop(SERVER).await;
                self.capture.stop();
            }

            ActionKind::Unrecognized(raw) => {
                warn!(action = %raw, "unrecognized action ignored");
            }
        }
    }

    async fn start(&mut self, name: &str, exe: &ExecutableConfig, result: &mut StageResult) -> bool {
        let path = exe.path.as_deref().unwrap_or(Path::new(""));

        match self
            .supervisor
            .start(name, path, exe.working_dir.as_deref(), &exe.args)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(process = name, error = %e, "process start failed");
                result.fail(e.to_string());
                false
            }
        }
    }

    async fn settle(&mut self) {
        let settle = &self.config.settle;
        sleep(settle.stage_delay()).await;

        if settle.strategy == SettleStrategy::Quiet {
            self.wait_for_quiet().await;
        }
    }

    /// Poll until no new output arrived for the quiet window, or the cap.
    async fn wait_for_quiet(&mut self) {
        let settle = &self.config.settle;
        let window = Duration::from_millis(settle.quiet_window_ms);
        let poll = Duration::from_millis(settle.poll_interval_ms.max(1));
        let deadline = Instant::now() + Duration::from_millis(settle.quiet_max_ms);

        let mut last = self.pending_output();
        let mut quiet_since = Instant::now();

        while Instant::now() < deadline {
            sleep(poll).await;

            let now = Instant::now();
            let pending = self.pending_output();
            if pending != last {
                last = pending;
                quiet_since = now;
            } else if now.duration_since(quiet_since) >= window {
                return;
            }
        }

        debug!(cap_ms = settle.quiet_max_ms, "output still growing at settle cap");
    }

    fn pending_output(&self) -> usize {
        self.supervisor.pending_output_len(CLIENT) + self.supervisor.pending_output_len(SERVER)
    }

    /// Output is only captured from processes that are still running.
    fn capture_output(&mut self, result: &mut StageResult) {
        if self.supervisor.is_running(CLIENT) {
            result.actual_client_console = Some(self.supervisor.output(CLIENT));
        }
        if self.supervisor.is_running(SERVER) {
            result.actual_server_console = Some(self.supervisor.output(SERVER));
        }
    }

    fn validate(&mut self, stage: &TestStage, result: &mut StageResult) {
        if self.config.validate_client_console {
            if let Some(expected) = non_empty(&stage.expected_client_console) {
                let cmp = compare(expected, result.actual_client_console.as_deref().unwrap_or(""), true);
                result.client_console_matched = Some(cmp.matched);
                record(result, "Client console output mismatch", cmp);
            }
        }

        if self.config.validate_server_console {
            if let Some(expected) = non_empty(&stage.expected_server_console) {
                let cmp = compare(expected, result.actual_server_console.as_deref().unwrap_or(""), true);
                result.server_console_matched = Some(cmp.matched);
                record(result, "Server console output mismatch", cmp);
            }
        }

        if self.config.validate_network_traffic {
            if let Some(expected) = stage.expected_network.as_ref().filter(|n| !n.is_empty()) {
                match self.capture.exchange_for_stage(stage.stage_number) {
                    None => {
                        result.network_matched = Some(false);
                        result.fail(format!(
                            "No network data captured for stage {}",
                            stage.stage_number
                        ));
                    }
                    Some(actual) => {
                        let matched = validate_network(expected, &actual, result);
                        result.network_matched = Some(matched);
                        result.actual_network = Some(actual);
                    }
                }
            }
        }
    }
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.is_empty())
}

fn record(result: &mut StageResult, headline: &str, cmp: Comparison) {
    if cmp.matched {
        return;
    }

    if let Some(excerpt) = &cmp.excerpt {
        debug!(stage = result.stage_number, "{}\n{}", headline, excerpt);
    }

    result.fail(headline);
    result.messages.extend(cmp.differences);
}

fn validate_network(expected: &NetworkExpectation, actual: &NetworkActual, result: &mut StageResult) -> bool {
    let before = result.messages.len();

    if !expected.url.trim().is_empty() && !compare(&expected.url, &actual.url, false).matched {
        result.fail(format!(
            "URL mismatch: expected '{}', got '{}'",
            expected.url, actual.url
        ));
    }

    if !expected.method.trim().is_empty()
        && !expected.method.trim().eq_ignore_ascii_case(actual.method.trim())
    {
        result.fail(format!(
            "Method mismatch: expected '{}', got '{}'",
            expected.method, actual.method
        ));
    }

    if !expected.request.trim().is_empty() {
        record(
            result,
            "Request payload mismatch",
            compare(&expected.request, &actual.request, true),
        );
    }

    if !expected.response.trim().is_empty() {
        record(
            result,
            "Response payload mismatch",
            compare(&expected.response, &actual.response, true),
        );
    }

    result.messages.len() == before
}
