// src/database.rs

//! Database reset collaborator.
//!
//! A reset runs once before the first stage of every test case so each test
//! case sees the same seed data.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

#[async_trait]
pub trait DatabaseReset: Send + Sync {
    async fn reset(&self, script: &Path, connection: &str) -> Result<()>;
}

/// Runs an operator-provided tool (`sqlcmd`, `psql`, a shell script ...).
///
/// `{script}` and `{connection}` in the argument list are replaced before
/// launch. The reset succeeds iff the tool exits with status 0.
#[derive(Debug, Clone)]
pub struct CommandDatabaseReset {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDatabaseReset {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &DatabaseConfig) -> Self {
        Self::new(
            cfg.command.clone(),
            cfg.args.clone(),
            Duration::from_secs(cfg.timeout_seconds),
        )
    }

    fn render_args(&self, script: &Path, connection: &str) -> Vec<String> {
        let script = script.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{script}", &script).replace("{connection}", connection))
            .collect()
    }
}

#[async_trait]
impl DatabaseReset for CommandDatabaseReset {
    async fn reset(&self, script: &Path, connection: &str) -> Result<()> {
        if !script.is_file() {
            bail!("Database script not found: {}", script.display());
        }

        let args = self.render_args(script, connection);
        debug!(command = %self.command, ?args, "running database reset");

        let child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn database tool {:?}", self.command))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .with_context(|| format!("Database reset timed out after {}s", self.timeout.as_secs()))?
            .context("Failed while waiting for database tool")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Database tool exited with {}: {}", output.status, stderr.trim());
        }

        info!(script = %script.display(), "database reset");
        Ok(())
    }
}

/// Reset tool plus the script and connection it is run with.
pub struct DatabaseSetup {
    pub reset: Box<dyn DatabaseReset>,
    pub script: PathBuf,
    pub connection: String,
}

impl DatabaseSetup {
    pub async fn run(&self) -> Result<()> {
        self.reset.reset(&self.script, &self.connection).await
    }
}
