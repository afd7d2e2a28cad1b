//! Error types for orchestrator operations.
//!
//! Every variant is recoverable at the session boundary: the caller shows it
//! and keeps going. Execution failures normally travel as an
//! [`Outcome`](crate::types::Outcome) on the result record; the matching
//! variants here exist so they can be displayed and matched uniformly.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Label;

/// Errors that can occur while orchestrating hardening modules.
#[derive(Debug, Error)]
pub enum Error {
    /// No module registered under this id
    #[error("module not found: {id}")]
    ModuleNotFound {
        /// Requested module id
        id: String,
    },

    /// Two modules were declared with the same id
    #[error("duplicate module id: {id}")]
    DuplicateModule {
        /// The repeated id
        id: String,
    },

    /// Module executable is missing or not executable
    #[error("script not found: {}", path.display())]
    ExecutableMissing {
        /// Resolved executable path
        path: PathBuf,
    },

    /// Privilege elevation was rejected by the environment
    #[error("privilege denied for {module}: {message}")]
    PrivilegeDenied {
        /// Module that needed elevation
        module: String,
        /// Why elevation failed
        message: String,
    },

    /// Module exceeded its timeout and was terminated
    #[error("{module} timed out after {seconds}s")]
    TimedOut {
        /// Module id
        module: String,
        /// Timeout that was exceeded
        seconds: u64,
    },

    /// Module was interrupted by the user
    #[error("{module} cancelled")]
    Cancelled {
        /// Module id
        module: String,
    },

    /// Module ran and exited unsuccessfully
    #[error("{module} failed{}", exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    Failed {
        /// Module id
        module: String,
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
    },

    /// Empty or unusable path input
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// Path does not resolve to a readable report
    #[error("report not found: {}", path.display())]
    ReportNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// A report could not be parsed into findings
    #[error("cannot parse {label} report: {message}")]
    ParseError {
        /// Which side of the comparison failed
        label: Label,
        /// Parser diagnostic
        message: String,
    },

    /// Scan type other than pre/post
    #[error("invalid scan type: {0:?} (expected pre or post)")]
    InvalidScanType(String),

    /// Underlying filesystem error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Source error
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding/decoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short, stable name of the error kind (used in logs and JSON output).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModuleNotFound { .. } => "module_not_found",
            Self::DuplicateModule { .. } => "duplicate_module",
            Self::ExecutableMissing { .. } => "executable_missing",
            Self::PrivilegeDenied { .. } => "privilege_denied",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled { .. } => "cancelled",
            Self::Failed { .. } => "failed",
            Self::InvalidPath(_) => "invalid_path",
            Self::ReportNotFound { .. } => "report_not_found",
            Self::ParseError { .. } => "parse_error",
            Self::InvalidScanType(_) => "invalid_scan_type",
            Self::Io { .. } => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Actionable advice for the user.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::ModuleNotFound { .. } => "Run `hardenctl list` to see registered modules",
            Self::DuplicateModule { .. } => "Give every [[modules]] entry in config.toml a unique id",
            Self::ExecutableMissing { .. } => {
                "Install the script into the scripts directory and make it executable"
            }
            Self::PrivilegeDenied { .. } => "Run as root or make sure sudo is available",
            Self::TimedOut { .. } => "Increase the timeout with --timeout or in config.toml",
            Self::Cancelled { .. } => "Re-run the module when ready",
            Self::Failed { .. } => "Check the module output above for details",
            Self::InvalidPath(_) => "Enter a non-empty file path",
            Self::ReportNotFound { .. } => "Check the path, or run `hardenctl reports`",
            Self::ParseError { .. } => "Make sure the report is in key=value format",
            Self::InvalidScanType(_) => "Use `pre` or `post`",
            Self::Io { .. } => "Check directory permissions",
            Self::Serialization(_) => "The file may be corrupted",
        }
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;
