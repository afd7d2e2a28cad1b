//! Provider traits injected into the execution engine
//!
//! These keep the engine free of any particular sudo implementation,
//! terminal, or signal handling, so each boundary can be tested on its own.

use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::types::{Module, Stream};

/// Capability for running modules with elevated privileges
///
/// The engine calls [`ensure`](Self::ensure) before spawning anything, so a
/// rejected elevation never starts a process.
pub trait PrivilegeProvider: Send + Sync {
    /// Make sure elevation is available for this module.
    ///
    /// Returns [`Error::PrivilegeDenied`] when the environment refuses.
    fn ensure(&self, module: &Module, reason: &str) -> Result<()>;

    /// Build the command that runs `program` with elevated privileges
    fn command(&self, program: &Path) -> Command;

    /// Kill a process group whose members may run as another user.
    ///
    /// Called for privileged runs after the engine's own SIGKILL, which can
    /// only reach processes owned by the current user. The default does
    /// nothing beyond that.
    fn kill_group(&self, _pgid: u32) -> io::Result<()> {
        Ok(())
    }
}

/// Runs privileged modules directly, for processes that already hold the
/// needed privileges (root, or test environments)
pub struct NoElevation;

impl PrivilegeProvider for NoElevation {
    fn ensure(&self, _module: &Module, _reason: &str) -> Result<()> {
        Ok(())
    }

    fn command(&self, program: &Path) -> Command {
        Command::new(program)
    }
}

/// Rejects every elevation request
pub struct DenyElevation;

impl PrivilegeProvider for DenyElevation {
    fn ensure(&self, module: &Module, _reason: &str) -> Result<()> {
        Err(Error::PrivilegeDenied {
            module: module.id.clone(),
            message: "elevation is disabled".to_string(),
        })
    }

    fn command(&self, program: &Path) -> Command {
        Command::new(program)
    }
}

/// Receives child output line by line as it is produced
pub trait OutputSink {
    /// Called for each line, without its trailing newline
    fn line(&mut self, stream: Stream, line: &str);
}

/// Discards output
pub struct NoOutput;

impl OutputSink for NoOutput {
    fn line(&mut self, _stream: Stream, _line: &str) {}
}

/// Polled by the engine while a module runs
pub trait CancelSignal {
    fn is_cancelled(&self) -> bool;
}

/// Never cancels
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
