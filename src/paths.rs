//! Path resolution for hardenctl
//!
//! Everything lives under one base directory:
//!
//! ```text
//! <base>/
//!   bash-scripts/           module scripts
//!   logs/executions.jsonl   execution history
//!   reports/                pre/post audit snapshots
//!   config.toml             optional settings and module catalog
//! ```
//!
//! # Base Directory Resolution
//!
//! 1. `--base-dir` flag
//! 2. `HARDENCTL_HOME` environment variable
//! 3. `~/linux-hardening-tool`

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use hardenkit::LOG_FILE_NAME;

/// Environment variable for base directory override
pub const ENV_HOME: &str = "HARDENCTL_HOME";

/// Default base directory name under `$HOME`
const DEFAULT_DIR_NAME: &str = "linux-hardening-tool";

/// Resolved on-disk layout
#[derive(Debug, Clone)]
pub struct Layout {
    pub base: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve the base directory from flag, environment, or default
    pub fn resolve(flag: Option<&Path>) -> Result<Self> {
        if let Some(dir) = flag {
            let path = expand(&dir.to_string_lossy());
            log::debug!("Using base dir from --base-dir: {}", path.display());
            return Ok(Self::new(path));
        }

        if let Ok(dir) = std::env::var(ENV_HOME) {
            let path = expand(&dir);
            log::debug!("Using base dir from {}: {}", ENV_HOME, path.display());
            return Ok(Self::new(path));
        }

        let home = dirs::home_dir().context("Could not determine home directory")?;
        let path = home.join(DEFAULT_DIR_NAME);
        log::debug!("Using default base dir: {}", path.display());
        Ok(Self::new(path))
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.base.join("bash-scripts")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE_NAME)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.base.join("reports")
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.toml")
    }

    /// Create `logs/` and `reports/`
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.logs_dir(), self.reports_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
