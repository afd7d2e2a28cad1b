//! Scoped sudo context for privileged modules
//!
//! Sudo is never requested up front. The first privileged module triggers a
//! single `sudo -v` (with the module's reason shown to the user); every
//! privileged run after that uses `sudo -n` so a child process can never
//! stop on a password prompt. The cached credential is dropped on exit.

use hardenkit::{Error, Module, PrivilegeProvider, Result};
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

/// Scoped sudo context - invalidates the sudo timestamp on drop
pub struct SudoContext {
    root: bool,
    interactive: bool,
    validated: AtomicBool,
}

impl SudoContext {
    /// Detect whether we already run as root
    pub fn new() -> Self {
        Self::with_root(is_root())
    }

    pub fn with_root(root: bool) -> Self {
        Self {
            root,
            interactive: console::user_attended(),
            validated: AtomicBool::new(false),
        }
    }

    /// Check if sudo is currently valid (without prompting)
    pub fn is_valid() -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Validate sudo, prompting for a password when attended
    fn acquire(&self, module: &Module, reason: &str) -> Result<()> {
        let denied = |message: String| Error::PrivilegeDenied {
            module: module.id.clone(),
            message,
        };

        let mut cmd = Command::new("sudo");
        if self.interactive {
            // Prompt user with reason
            eprintln!();
            eprintln!("  Sudo required for {}: {}", module.display_name, reason);
            eprintln!();
            cmd.arg("-v");
        } else {
            cmd.args(["-n", "-v"]).stderr(Stdio::null());
        }

        let status = cmd
            .status()
            .map_err(|e| denied(format!("could not execute sudo: {e}")))?;
        if !status.success() {
            return Err(denied("failed to acquire sudo privileges".to_string()));
        }
        Ok(())
    }

    /// `sudo -n kill -KILL -- -<pgid>`: reaches root-owned members of a group
    fn kill_command(pgid: u32) -> Command {
        let mut cmd = Command::new("sudo");
        cmd.args(["-n", "kill", "-KILL", "--"])
            .arg(format!("-{pgid}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl Default for SudoContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeProvider for SudoContext {
    fn ensure(&self, module: &Module, reason: &str) -> Result<()> {
        if self.root {
            return Ok(());
        }
        if self.validated.load(Ordering::SeqCst) && Self::is_valid() {
            return Ok(());
        }
        self.acquire(module, reason)?;
        self.validated.store(true, Ordering::SeqCst);
        log::debug!("Sudo validated for {}", module.id);
        Ok(())
    }

    fn command(&self, program: &Path) -> Command {
        if self.root {
            return Command::new(program);
        }
        let mut cmd = Command::new("sudo");
        cmd.args(["-n", "--"]).arg(program);
        cmd
    }

    fn kill_group(&self, pgid: u32) -> io::Result<()> {
        if self.root {
            // The engine's own SIGKILL already reaches every member
            return Ok(());
        }
        let status = Self::kill_command(pgid).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("sudo kill exited with {status}")))
        }
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        if self.validated.load(Ordering::SeqCst) {
            // Invalidate sudo timestamp to release privileges
            let _ = Command::new("sudo").args(["-k"]).status();
        }
    }
}

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}
