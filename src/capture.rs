// src/capture.rs

//! Network capture collaborators.
//!
//! The engine only asks a capture for "the HTTP exchange of stage n". How the
//! exchange is observed (proxy, packet capture, server-side log) is up to the
//! implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::results::NetworkActual;

pub trait NetworkCapture: Send {
    /// Begin observing traffic between the two ports. Best effort.
    fn start(&mut self, client_port: u16, server_port: u16) -> bool;

    fn stop(&mut self);

    /// The exchange attributed to `stage_number`, if any was observed.
    fn exchange_for_stage(&mut self, stage_number: u32) -> Option<NetworkActual>;

    /// Called before the first stage of every test case.
    fn begin_test_case(&mut self, _test_case_id: &str) {}
}

/// Observes nothing. Every network expectation fails with "no data".
#[derive(Debug, Default)]
pub struct NoCapture;

impl NetworkCapture for NoCapture {
    fn start(&mut self, client_port: u16, server_port: u16) -> bool {
        warn!(
            client_port,
            server_port, "network capture not configured; network expectations will fail"
        );
        false
    }

    fn stop(&mut self) {
        debug!("network capture stop requested");
    }

    fn exchange_for_stage(&mut self, _stage_number: u32) -> Option<NetworkActual> {
        None
    }
}

/// Reads exchanges an external proxy recorded as JSON files.
///
/// Layout, per test case:
///
/// captures/
///   TC01/
///     stage-2.json   {"url": "...", "method": "GET", "request": "", "response": "..."}
///
/// A `stage-<n>.json` directly under the root is used when the test case has
/// no folder of its own.
#[derive(Debug)]
pub struct DirectoryCapture {
    root: PathBuf,
    test_case: Option<String>,
    active: bool,
}

impl DirectoryCapture {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            test_case: None,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn stage_file(&self, stage_number: u32) -> Option<PathBuf> {
        let name = format!("stage-{}.json", stage_number);

        let scoped = self
            .test_case
            .as_ref()
            .map(|id| self.root.join(id).join(&name))
            .filter(|p| p.is_file());

        scoped.or_else(|| Some(self.root.join(&name)).filter(|p| p.is_file()))
    }
}

fn read_exchange(path: &Path) -> Result<NetworkActual> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read capture file {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid capture file {:?}", path))
}

impl NetworkCapture for DirectoryCapture {
    fn start(&mut self, client_port: u16, server_port: u16) -> bool {
        if !self.root.is_dir() {
            warn!(dir = %self.root.display(), "capture directory does not exist");
            return false;
        }

        info!(client_port, server_port, dir = %self.root.display(), "network capture started");
        self.active = true;
        true
    }

    fn stop(&mut self) {
        if self.active {
            info!("network capture stopped");
        }
        self.active = false;
    }

    // Files are written by a proxy outside this process, so they are read
    // whether or not `start` succeeded.
    fn exchange_for_stage(&mut self, stage_number: u32) -> Option<NetworkActual> {
        let path = self.stage_file(stage_number)?;

        match read_exchange(&path) {
            Ok(exchange) => Some(exchange),
            Err(e) => {
                warn!(stage = stage_number, error = %e, "ignoring capture file");
                None
            }
        }
    }

    fn begin_test_case(&mut self, test_case_id: &str) {
        self.test_case = Some(test_case_id.to_string());
    }
}
