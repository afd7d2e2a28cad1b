//! Core types for hardening orchestration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// Requirement level for elevated privileges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "level")]
pub enum PrivilegeRequirement {
    /// Runs as the invoking user
    #[default]
    None,
    /// Needs elevation, with the reason shown to the user
    Required { reason: String },
}

impl PrivilegeRequirement {
    /// Convenience constructor for [`PrivilegeRequirement::Required`]
    pub fn required(reason: impl Into<String>) -> Self {
        Self::Required {
            reason: reason.into(),
        }
    }
}

/// Area of the system a module touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Ssh,
    Firewall,
    Services,
    Filesystem,
    Kernel,
    Audit,
    Update,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Firewall => "firewall",
            Self::Services => "services",
            Self::Filesystem => "filesystem",
            Self::Kernel => "kernel",
            Self::Audit => "audit",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether re-running a module is known to be harmless
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Idempotency {
    /// Safe to run repeatedly; outcome is unchanged after the first success
    #[default]
    Idempotent,
    /// Each run may change the system further (e.g. package upgrades)
    Stateful,
}

/// What a module produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Changes system configuration
    #[default]
    Hardening,
    /// Prints an audit report on stdout
    AuditReport,
}

/// A single hardening or audit action exposed to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Stable identifier (e.g. "ssh")
    pub id: String,
    /// Name shown in the menu
    pub display_name: String,
    /// Absolute path of the script to run
    pub executable: PathBuf,
    /// Privilege needed to run it
    #[serde(default)]
    pub privilege: PrivilegeRequirement,
    pub category: Category,
    #[serde(default)]
    pub idempotency: Idempotency,
    #[serde(default)]
    pub kind: ModuleKind,
}

impl Module {
    pub fn requires_privilege(&self) -> bool {
        matches!(self.privilege, PrivilegeRequirement::Required { .. })
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotency == Idempotency::Idempotent
    }
}

/// Which side of a hardening pass a report was captured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Pre,
    Post,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pre" => Ok(Self::Pre),
            "post" => Ok(Self::Post),
            _ => Err(Error::InvalidScanType(s.trim().to_string())),
        }
    }
}

/// Classified result of one module run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Outcome {
    /// Exit code 0
    Success,
    /// Nonzero exit, or terminated by a signal we did not send
    Failed { exit_code: Option<i32> },
    /// Killed after exceeding the timeout
    TimedOut { after_secs: u64 },
    /// Killed because the user interrupted the run
    Cancelled,
    /// Nothing was spawned: executable missing or not executable
    ExecutableMissing,
    /// Nothing was spawned: elevation was rejected
    PrivilegeDenied,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed out",
            Self::Cancelled => "cancelled",
            Self::ExecutableMissing => "script not found",
            Self::PrivilegeDenied => "privilege denied",
        }
    }
}

/// Output stream of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Record of one module run. Created once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub module_id: String,
    pub executable: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Process id, when a process was spawned
    #[serde(default)]
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Raw exit code, if the process exited normally
    pub exit_status: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    pub outcome: Outcome,
    /// Human-readable reason for non-success outcomes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// The error matching a non-success outcome, for display
    pub fn error(&self) -> Option<Error> {
        let module = self.module_id.clone();
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failed { exit_code } => Some(Error::Failed {
                module,
                exit_code: *exit_code,
            }),
            Outcome::TimedOut { after_secs } => Some(Error::TimedOut {
                module,
                seconds: *after_secs,
            }),
            Outcome::Cancelled => Some(Error::Cancelled { module }),
            Outcome::ExecutableMissing => Some(Error::ExecutableMissing {
                path: self.executable.clone(),
            }),
            Outcome::PrivilegeDenied => Some(Error::PrivilegeDenied {
                module,
                message: self.detail.clone().unwrap_or_default(),
            }),
        }
    }
}
