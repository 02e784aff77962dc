// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// What a grading run validates and how long it may wait.
///
/// Built once before the first test case and never mutated while
/// test cases execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Compare captured client console output against expectations
    pub validate_client_console: bool,

    /// Compare captured server console output against expectations
    pub validate_server_console: bool,

    /// Compare captured HTTP exchanges against expectations
    pub validate_network_traffic: bool,

    /// Upper bound for a single stage (action + settle + capture + validation)
    pub stage_timeout_seconds: u64,

    /// Upper bound for spawning a process and its start settle delay
    pub process_start_timeout_seconds: u64,

    /// Settle delays between actions and output capture
    pub settle: SettleConfig,

    /// Ports handed to the network capture collaborator
    pub capture_ports: CapturePorts,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            validate_client_console: true,
            validate_server_console: true,
            validate_network_traffic: true,
            stage_timeout_seconds: 30,
            process_start_timeout_seconds: 10,
            settle: SettleConfig::default(),
            capture_ports: CapturePorts::default(),
        }
    }
}

impl GradingConfig {
    /// Client-side grading: server console is not validated.
    pub fn client_only() -> Self {
        Self::from_preset(Preset::ClientOnly)
    }

    /// Server-side grading: client console is not validated.
    pub fn server_only() -> Self {
        Self::from_preset(Preset::ServerOnly)
    }

    /// Console grading: network traffic is not validated.
    pub fn console_only() -> Self {
        Self::from_preset(Preset::ConsoleOnly)
    }

    /// HTTP grading: neither console is validated.
    pub fn http_only() -> Self {
        Self::from_preset(Preset::HttpOnly)
    }

    pub fn from_preset(preset: Preset) -> Self {
        let mut cfg = Self::default();
        cfg.apply_preset(preset);
        cfg
    }

    /// Overwrite the validation toggles with those of a preset.
    ///
    /// Timeouts and settle delays are left untouched.
    pub fn apply_preset(&mut self, preset: Preset) {
        let (client, server, network) = match preset {
            Preset::Default => (true, true, true),
            Preset::ClientOnly => (true, false, true),
            Preset::ServerOnly => (false, true, true),
            Preset::ConsoleOnly => (true, true, false),
            Preset::HttpOnly => (false, false, true),
        };

        self.validate_client_console = client;
        self.validate_server_console = server;
        self.validate_network_traffic = network;
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds.max(1))
    }

    pub fn process_start_timeout(&self) -> Duration {
        Duration::from_secs(self.process_start_timeout_seconds.max(1))
    }
}

/// Named validation presets.
///
/// These are convenience constructors, not bit flags: each one starts from
/// "validate everything" and switches off one or two dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    Default,
    ClientOnly,
    ServerOnly,
    ConsoleOnly,
    HttpOnly,
}

/// Settle delays.
///
/// Example in grader.yaml:
///
/// grading:
///   settle:
///     start_delay_ms: 500
///     stage_delay_ms: 1000
///     strategy: quiet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Wait after spawning a process before returning to the caller
    pub start_delay_ms: u64,

    /// Wait after a stage action before capturing output
    pub stage_delay_ms: u64,

    /// Pause between two stages of the same test case
    pub between_stages_ms: u64,

    /// How long `stop` waits for exit after killing a process
    pub stop_grace_ms: u64,

    pub strategy: SettleStrategy,

    /// `quiet` only: output must stay unchanged this long
    pub quiet_window_ms: u64,

    /// `quiet` only: hard cap on the whole settle wait
    pub quiet_max_ms: u64,

    /// `quiet` only: how often pending output is polled
    pub poll_interval_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 500,
            stage_delay_ms: 1000,
            between_stages_ms: 500,
            stop_grace_ms: 2000,
            strategy: SettleStrategy::Fixed,
            quiet_window_ms: 300,
            quiet_max_ms: 5000,
            poll_interval_ms: 50,
        }
    }
}

impl SettleConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }

    pub fn between_stages(&self) -> Duration {
        Duration::from_millis(self.between_stages_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SettleStrategy {
    /// Sleep for `stage_delay_ms`, then capture regardless
    #[default]
    Fixed,

    /// Sleep at least `stage_delay_ms`, then keep polling until output stops
    /// growing for `quiet_window_ms` (bounded by `quiet_max_ms`)
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturePorts {
    pub client: u16,
    pub server: u16,
}

impl Default for CapturePorts {
    fn default() -> Self {
        Self {
            client: 8001,
            server: 8000,
        }
    }
}

/// Root configuration loaded from `grader.yaml`.
///
/// Every section is optional. CLI flags only override values from here.
///
/// Example:
///
/// preset: console-only
/// client:
///   path: build/client
///   args: ["--port", "8001"]
/// server:
///   path: build/server
/// database:
///   command: sqlcmd
///   args: ["-S", "localhost", "-i", "{script}"]
///   script: db/reset.sql
/// capture:
///   dir: captures
/// output:
///   file: results/grade.json
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GraderFile {
    /// Validation preset; overrides the toggles inside `grading`
    pub preset: Option<Preset>,

    pub grading: GradingConfig,

    pub client: ExecutableConfig,

    pub server: ExecutableConfig,

    /// Database reset tool. Omit to skip database resets entirely.
    pub database: Option<DatabaseConfig>,

    pub capture: CaptureConfig,

    pub output: OutputConfig,
}

/// A student executable and how to launch it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecutableConfig {
    pub path: Option<PathBuf>,

    /// Defaults to the executable's folder, else the suite folder
    pub working_dir: Option<PathBuf>,

    pub args: Vec<String>,
}

/// External database reset tool.
///
/// `{script}` and `{connection}` inside `args` are substituted before launch.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Reset script, relative to the suite folder
    pub script: PathBuf,

    #[serde(default)]
    pub connection: String,

    #[serde(default = "default_database_timeout")]
    pub timeout_seconds: u64,
}

fn default_database_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Folder an external proxy writes `stage-<n>.json` exchanges into
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON report destination. Omit to only print the summary.
    pub file: Option<PathBuf>,
}

impl GraderFile {
    /// Load and parse `grader.yaml` from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut cfg: GraderFile =
            serde_yaml::from_str(&raw).context("Failed to parse YAML config")?;

        if let Some(preset) = cfg.preset {
            cfg.grading.apply_preset(preset);
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_switch_off_expected_dimensions() {
        let d = GradingConfig::default();
        assert!(d.validate_client_console && d.validate_server_console && d.validate_network_traffic);

        let c = GradingConfig::client_only();
        assert!(c.validate_client_console && !c.validate_server_console && c.validate_network_traffic);

        let s = GradingConfig::server_only();
        assert!(!s.validate_client_console && s.validate_server_console);

        let console = GradingConfig::console_only();
        assert!(!console.validate_network_traffic);
        assert!(console.validate_client_console && console.validate_server_console);

        let http = GradingConfig::http_only();
        assert!(!http.validate_client_console && !http.validate_server_console);
        assert!(http.validate_network_traffic);
    }

    #[test]
    fn preset_keeps_timeouts() {
        let mut cfg = GradingConfig {
            stage_timeout_seconds: 7,
            ..GradingConfig::default()
        };
        cfg.apply_preset(Preset::HttpOnly);
        assert_eq!(cfg.stage_timeout_seconds, 7);
    }

    #[test]
    fn grader_file_defaults_and_preset() {
        let yaml = r#"
preset: console-only
grading:
  stage_timeout_seconds: 12
  settle:
    stage_delay_ms: 250
    strategy: quiet
client:
  path: bin/client
  args: ["--verbose"]
"#;
        let mut cfg: GraderFile = serde_yaml::from_str(yaml).unwrap();
        if let Some(p) = cfg.preset {
            cfg.grading.apply_preset(p);
        }

        assert!(!cfg.grading.validate_network_traffic);
        assert_eq!(cfg.grading.stage_timeout_seconds, 12);
        assert_eq!(cfg.grading.process_start_timeout_seconds, 10);
        assert_eq!(cfg.grading.settle.stage_delay_ms, 250);
        assert_eq!(cfg.grading.settle.start_delay_ms, 500);
        assert_eq!(cfg.grading.settle.strategy, SettleStrategy::Quiet);
        assert_eq!(cfg.client.args, vec!["--verbose".to_string()]);
        assert!(cfg.server.path.is_none());
        assert!(cfg.database.is_none());
    }
}
