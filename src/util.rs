// src/util.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Read a UTF-8 file into a String with a clear error message.
///
/// This is mainly used for:
/// - suite.yaml / testcase.yaml
/// - grader.yaml
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file {:?}", path))
}

/// Ensure a directory exists (create it if missing).
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {:?}", path))
}

/// Pretty-print `payload` as JSON to `path`, creating parent folders.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, payload: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(payload)
        .context("Failed to serialize output JSON")?;

    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write output file {:?}", path))?;

    Ok(())
}

/// Resolve `path` against `base` unless it is already absolute.
///
/// Executables are launched with a working directory of their own, so a
/// relative program path would otherwise be looked up from the wrong place.
///
/// Example:
/// base = /home/grader
/// path = build/client
/// → /home/grader/build/client
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
