#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use suitegrader::config::{ExecutableConfig, GradingConfig};
use suitegrader::model::{ActionKind, TestStage, UserAction};

/// Grading config with settle delays short enough for tests.
pub fn fast_config() -> GradingConfig {
    let mut cfg = GradingConfig::default();
    cfg.settle.start_delay_ms = 100;
    cfg.settle.stage_delay_ms = 300;
    cfg.settle.between_stages_ms = 20;
    cfg.settle.stop_grace_ms = 1000;
    cfg
}

/// Write `body` as a shell script and return its path.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    path
}

/// `/bin/sh <script>` as an executable config.
pub fn sh(script: &Path) -> ExecutableConfig {
    ExecutableConfig {
        path: Some(PathBuf::from("/bin/sh")),
        working_dir: None,
        args: vec![script.to_string_lossy().to_string()],
    }
}

pub fn stage(n: u32, kind: ActionKind) -> TestStage {
    TestStage {
        stage_number: n,
        user_action: Some(UserAction::new(kind)),
        ..TestStage::default()
    }
}

pub fn input_stage(n: u32, text: &str, expected_client: &str) -> TestStage {
    TestStage {
        stage_number: n,
        user_action: Some(UserAction::input(text)),
        expected_client_console: Some(expected_client.to_string()),
        ..TestStage::default()
    }
}

/// Poll `check` every 20ms until it returns true or `limit` passes.
pub async fn eventually<F: FnMut() -> bool>(limit: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
