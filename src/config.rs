//! hardenctl configuration
//!
//! `config.toml` in the base directory is optional. Without it (or without a
//! `[[modules]]` table) the built-in catalog is used.
//!
//! ```toml
//! timeout_secs = 1800
//! grace_secs = 5
//! report_module = "audit-report"
//!
//! [[modules]]
//! id = "ssh"
//! name = "SSH Hardening"
//! script = "ssh_hardening.sh"
//! category = "ssh"
//! ```

use anyhow::{Context, Result};
use hardenkit::{
    Category, DEFAULT_GRACE, DEFAULT_REPORT_MODULE, DEFAULT_TIMEOUT, Idempotency, Module,
    ModuleKind, PrivilegeRequirement, Settings,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

// ============================================================================
// Main Config Schema
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HardenConfig {
    /// Per-run timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between SIGTERM and SIGKILL
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    /// Module used by `audit` and the menu's report entry
    #[serde(default = "default_report_module")]
    pub report_module: String,

    /// Scripts directory, relative to the base directory unless absolute
    #[serde(default)]
    pub scripts_dir: Option<String>,

    /// Module catalog; empty means the built-in catalog
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

impl Default for HardenConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            grace_secs: default_grace_secs(),
            report_module: default_report_module(),
            scripts_dir: None,
            modules: Vec::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_grace_secs() -> u64 {
    DEFAULT_GRACE.as_secs()
}

fn default_report_module() -> String {
    DEFAULT_REPORT_MODULE.to_string()
}

fn default_true() -> bool {
    true
}

/// One `[[modules]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub id: String,
    pub name: String,
    /// Script path, relative to the scripts directory unless absolute
    pub script: String,
    pub category: Category,
    #[serde(default = "default_true")]
    pub privileged: bool,
    /// Reason shown when asking for sudo
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub idempotency: Idempotency,
    #[serde(default)]
    pub kind: ModuleKind,
}

impl ModuleSpec {
    fn builtin(id: &str, name: &str, script: &str, category: Category) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            script: script.to_string(),
            category,
            privileged: true,
            reason: None,
            idempotency: Idempotency::Idempotent,
            kind: ModuleKind::Hardening,
        }
    }

    /// Resolve against the scripts directory
    pub fn into_module(self, scripts_dir: &Path) -> Module {
        let script = paths::expand(&self.script);
        let executable = if script.is_absolute() {
            script
        } else {
            scripts_dir.join(script)
        };
        let privilege = if self.privileged {
            let reason = self
                .reason
                .unwrap_or_else(|| format!("{} changes system configuration", self.name));
            PrivilegeRequirement::required(reason)
        } else {
            PrivilegeRequirement::None
        };
        Module {
            id: self.id,
            display_name: self.name,
            executable,
            privilege,
            category: self.category,
            idempotency: self.idempotency,
            kind: self.kind,
        }
    }
}

/// Built-in catalog, in menu order
fn builtin_specs() -> Vec<ModuleSpec> {
    let mut update = ModuleSpec::builtin("update", "System Update", "update_system.sh", Category::Update);
    update.idempotency = Idempotency::Stateful;

    let mut audit = ModuleSpec::builtin(
        DEFAULT_REPORT_MODULE,
        "Generate Audit Report",
        "audit_generate.sh",
        Category::Audit,
    );
    audit.kind = ModuleKind::AuditReport;
    audit.reason = Some("Lynis needs root to inspect the whole system".to_string());

    vec![
        ModuleSpec::builtin("ssh", "SSH Hardening", "ssh_hardening.sh", Category::Ssh),
        ModuleSpec::builtin("firewall", "Firewall", "firewall_hardening.sh", Category::Firewall),
        ModuleSpec::builtin("services", "Service Cleanup", "service_cleanup.sh", Category::Services),
        ModuleSpec::builtin(
            "file-permissions",
            "File Permissions",
            "filepermissions_hardening.sh",
            Category::Filesystem,
        ),
        ModuleSpec::builtin("kernel", "Kernel Hardening", "kernel_hardening.sh", Category::Kernel),
        ModuleSpec::builtin("auditd", "System Audit (auditd)", "auditd_configure.sh", Category::Audit),
        update,
        audit,
    ]
}

/// Built-in modules resolved against `scripts_dir`
pub fn builtin_modules(scripts_dir: &Path) -> Vec<Module> {
    builtin_specs()
        .into_iter()
        .map(|spec| spec.into_module(scripts_dir))
        .collect()
}

impl HardenConfig {
    /// Load `config.toml`, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    pub fn scripts_dir(&self, base: &Path, default: PathBuf) -> PathBuf {
        match &self.scripts_dir {
            Some(dir) => {
                let dir = paths::expand(dir);
                if dir.is_absolute() { dir } else { base.join(dir) }
            }
            None => default,
        }
    }

    /// Configured catalog, or the built-in one
    pub fn modules(&self, scripts_dir: &Path) -> Vec<Module> {
        if self.modules.is_empty() {
            return builtin_modules(scripts_dir);
        }
        self.modules
            .iter()
            .cloned()
            .map(|spec| spec.into_module(scripts_dir))
            .collect()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            timeout: Duration::from_secs(self.timeout_secs),
            report_module: self.report_module.clone(),
        }
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}
