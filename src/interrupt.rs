//! Ctrl-C handling
//!
//! A single process-wide handler (installed through `ctrlc`) records every
//! SIGINT in a flag. Modules run in their own process group, so a terminal
//! Ctrl-C reaches only this process; while an [`InterruptGuard`] is alive the
//! engine polls that flag as its cancel signal. Between runs the menu's line
//! reader polls the same flag and ends the session cleanly.

use hardenkit::CancelSignal;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install the Ctrl-C handler. Safe to call repeatedly.
pub fn install() -> bool {
    *INSTALLED.get_or_init(|| {
        match ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not install Ctrl-C handler: {}", e);
                false
            }
        }
    })
}

/// Flag raised by the handler on each Ctrl-C
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}

/// Cancel signal for a single module run.
///
/// Starts clear and clears again on drop, so the Ctrl-C that cancelled a run
/// does not also end the menu.
pub struct InterruptGuard {
    flag: &'static AtomicBool,
}

impl InterruptGuard {
    pub fn begin() -> Self {
        install();
        Self::on(flag())
    }

    fn on(flag: &'static AtomicBool) -> Self {
        flag.store(false, Ordering::SeqCst);
        Self { flag }
    }
}

impl CancelSignal for InterruptGuard {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
