use anyhow::{Context as _, Result};
use hardenkit::{
    Comparator, Engine, ExecutionLog, Registry, ReportStore, Session, SessionCommand,
    SessionResponse,
};

use crate::Context;
use crate::config::HardenConfig;
use crate::interrupt::InterruptGuard;
use crate::sudo::SudoContext;
use crate::ui;

// Interactive
pub mod menu;

// One-shot commands
pub mod audit;
pub mod compare;
pub mod history;
pub mod list;
pub mod reports;
pub mod run;

/// Build the session from config.toml and the base directory layout
pub fn open_session(ctx: &Context) -> Result<Session> {
    let layout = &ctx.layout;
    let config = HardenConfig::load(&layout.config_file())?;
    let scripts_dir = config.scripts_dir(&layout.base, layout.scripts_dir());
    log::debug!("Scripts directory: {}", scripts_dir.display());

    let registry = Registry::new(config.modules(&scripts_dir))
        .with_context(|| format!("Invalid module catalog in {}", layout.config_file().display()))?;
    let engine = Engine::new(
        Box::new(SudoContext::new()),
        ExecutionLog::open(layout.log_file()),
    )
    .with_grace(config.grace());

    Ok(Session::new(
        registry,
        engine,
        ReportStore::new(layout.reports_dir()),
        Comparator::default(),
        config.settings(),
    ))
}

/// Send one command with terminal output and Ctrl-C cancellation
pub fn execute(session: &mut Session, command: SessionCommand) -> SessionResponse {
    let guard = InterruptGuard::begin();
    let response = session.handle(command, &mut ui::TerminalSink, &guard);
    drop(guard);
    response
}
