// src/supervisor.rs

//! Named external processes with captured stdio.
//!
//! The supervisor exclusively owns every child handle it starts. Output is
//! pulled by per-stream reader tasks into a buffer pair shared with the
//! supervisor; callers only ever see it through a consuming drain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::GradingConfig;
use crate::process_tree;

/// Process name used for the student client.
pub const CLIENT: &str = "Client";

/// Process name used for the student server.
pub const SERVER: &str = "Server";

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{name} executable path not provided")]
    EmptyPath { name: String },

    #[error("{name} executable not found: {}", .path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("Failed to start {} process: {source}", .name.to_lowercase())]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
struct OutputBuffers {
    stdout: String,
    stderr: String,
}

type SharedBuffers = Arc<Mutex<OutputBuffers>>;

fn lock(buffers: &SharedBuffers) -> MutexGuard<'_, OutputBuffers> {
    // a reader task panicking mid-append leaves nothing worth discarding
    buffers.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

struct ManagedProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    buffers: SharedBuffers,
    readers: Vec<JoinHandle<()>>,
}

pub struct ProcessSupervisor {
    processes: HashMap<String, ManagedProcess>,
    start_delay: Duration,
    start_timeout: Duration,
    stop_grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(config: &GradingConfig) -> Self {
        Self {
            processes: HashMap::new(),
            start_delay: config.settle.start_delay(),
            start_timeout: config.process_start_timeout(),
            stop_grace: config.settle.stop_grace(),
        }
    }

    /// Start `executable` under `name`, replacing any process already
    /// registered under that name.
    ///
    /// Returns once the process has been given its start settle delay
    /// (never longer than the process start timeout).
    pub async fn start(
        &mut self,
        name: &str,
        executable: &Path,
        working_dir: Option<&Path>,
        args: &[String],
    ) -> Result<(), SupervisorError> {
        self.stop(name).await;

        if executable.as_os_str().is_empty() {
            return Err(SupervisorError::EmptyPath { name: name.to_string() });
        }

        if !executable.is_file() {
            return Err(SupervisorError::NotFound {
                name: name.to_string(),
                path: executable.to_path_buf(),
            });
        }

        let mut cmd = Command::new(executable);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            name: name.to_string(),
            source,
        })?;

        let buffers = SharedBuffers::default();
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(name, stdout, Stream::Stdout, Arc::clone(&buffers)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(name, stderr, Stream::Stderr, Arc::clone(&buffers)));
        }

        info!(
            process = name,
            pid = child.id(),
            executable = %executable.display(),
            "process started"
        );

        self.processes.insert(
            name.to_string(),
            ManagedProcess {
                stdin: child.stdin.take(),
                child,
                buffers,
                readers,
            },
        );

        tokio::time::sleep(self.start_delay.min(self.start_timeout)).await;

        Ok(())
    }

    /// Write `text` plus a newline to the process's stdin.
    ///
    /// Returns false without side effects when the process is not running.
    pub async fn send_input(&mut self, name: &str, text: &str) -> bool {
        if !self.is_running(name) {
            warn!(process = name, "input dropped: process not running");
            return false;
        }

        let Some(stdin) = self.processes.get_mut(name).and_then(|p| p.stdin.as_mut()) else {
            return false;
        };

        let line = format!("{}\n", text);
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        };

        match written.await {
            Ok(()) => {
                debug!(process = name, input = text, "input sent");
                true
            }
            Err(e) => {
                warn!(process = name, error = %e, "failed to write input");
                false
            }
        }
    }

    /// Everything captured since the last drain: stdout, then stderr.
    ///
    /// Both buffers are cleared under the same lock, so a line appended
    /// concurrently shows up in exactly one drain. Unknown names yield "".
    pub fn output(&self, name: &str) -> String {
        let Some(process) = self.processes.get(name) else {
            return String::new();
        };

        let mut guard = lock(&process.buffers);
        let mut out = std::mem::take(&mut guard.stdout);
        out.push_str(&std::mem::take(&mut guard.stderr));
        out
    }

    /// Bytes waiting to be drained, without consuming them.
    pub fn pending_output_len(&self, name: &str) -> usize {
        self.processes
            .get(name)
            .map(|p| {
                let guard = lock(&p.buffers);
                guard.stdout.len() + guard.stderr.len()
            })
            .unwrap_or(0)
    }

    pub fn is_running(&mut self, name: &str) -> bool {
        match self.processes.get_mut(name) {
            Some(p) => matches!(p.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Stop `name` and its descendants. Idempotent; failures are logged only.
    pub async fn stop(&mut self, name: &str) {
        let Some(mut process) = self.processes.remove(name) else {
            return;
        };

        drop(process.stdin.take());

        if let Some(pid) = process.child.id() {
            let killed = process_tree::kill_descendants(pid);
            if killed > 0 {
                debug!(process = name, killed, "descendants killed");
            }
        }

        if let Err(e) = process.child.start_kill() {
            // already exited is the common case here
            debug!(process = name, error = %e, "kill not delivered");
        }

        match tokio::time::timeout(self.stop_grace, process.child.wait()).await {
            Ok(Ok(status)) => info!(process = name, %status, "process stopped"),
            Ok(Err(e)) => warn!(process = name, error = %e, "failed waiting for process exit"),
            Err(_) => warn!(
                process = name,
                grace_ms = self.stop_grace.as_millis() as u64,
                "process did not exit within grace period"
            ),
        }

        for reader in process.readers {
            reader.abort();
        }
    }

    pub async fn stop_all(&mut self) {
        let names: Vec<String> = self.processes.keys().cloned().collect();
        for name in names {
            self.stop(&name).await;
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.processes.keys().map(String::as_str).collect()
    }
}

fn spawn_reader<R>(name: &str, stream: R, which: Stream, buffers: SharedBuffers) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let name = name.to_string();

    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();

        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&raw);
                    let line = text.trim_end_matches(['\n', '\r']);

                    let mut guard = lock(&buffers);
                    let target = match which {
                        Stream::Stdout => &mut guard.stdout,
                        Stream::Stderr => &mut guard.stderr,
                    };
                    target.push_str(line);
                    target.push('\n');
                }
                Err(e) => {
                    debug!(process = %name, stream = ?which, error = %e, "output reader stopped");
                    break;
                }
            }
        }
    })
}
