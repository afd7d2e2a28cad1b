//! Append-only execution log
//!
//! Every [`ExecutionResult`] is kept in memory for the session and, when a
//! path is configured, appended to a JSON Lines file. Each record is written
//! with a single append-mode `write_all`, one line per run.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::ExecutionResult;

/// File name of the on-disk log inside the logs directory
pub const LOG_FILE_NAME: &str = "executions.jsonl";

#[derive(Debug, Default)]
pub struct ExecutionLog {
    path: Option<PathBuf>,
    entries: Vec<ExecutionResult>,
}

impl ExecutionLog {
    /// Log kept only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Log persisted to `path` (created on first append)
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one result.
    ///
    /// The in-memory entry is kept even when the disk write fails.
    pub fn append(&mut self, result: ExecutionResult) -> Result<()> {
        let persisted = match &self.path {
            Some(path) => write_line(path, &result),
            None => Ok(()),
        };
        self.entries.push(result);
        persisted
    }

    /// Results recorded during this session, oldest first
    pub fn entries(&self) -> &[ExecutionResult] {
        &self.entries
    }

    /// Read every result recorded in a log file, oldest first.
    ///
    /// A missing file is an empty history. Lines that do not decode are
    /// skipped with a warning rather than failing the whole read.
    pub fn history(path: &Path) -> Result<Vec<ExecutionResult>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut results = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(result) => results.push(result),
                Err(e) => log::warn!("Skipping {}:{}: {}", path.display(), idx + 1, e),
            }
        }
        Ok(results)
    }
}

fn write_line(path: &Path, result: &ExecutionResult) -> Result<()> {
    let mut line = serde_json::to_string(result)?;
    line.push('\n');

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| Error::io(path, e))?;
    log::debug!("Logged {} run to {}", result.module_id, path.display());
    Ok(())
}
