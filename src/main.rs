mod cli;
mod commands;
mod config;
mod interrupt;
mod paths;
mod sudo;
mod ui;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use paths::Layout;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub layout: Layout,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let command = cli.command.unwrap_or(Command::Menu);
    if let Command::Completions { shell } = command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "hardenctl", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let layout = Layout::resolve(cli.base_dir.as_deref())?;
    layout
        .ensure()
        .with_context(|| format!("Could not prepare {}", layout.base.display()))?;

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        layout,
    };

    match command {
        Command::Menu => commands::menu::run(&ctx).map(|()| ExitCode::SUCCESS),
        Command::List => commands::list::run(&ctx).map(|()| ExitCode::SUCCESS),
        Command::Run(args) => commands::run::run(&ctx, args),
        Command::Audit { scan_type } => commands::audit::run(&ctx, &scan_type),
        Command::Compare(args) => commands::compare::run(&ctx, args).map(|()| ExitCode::SUCCESS),
        Command::Reports => commands::reports::run(&ctx).map(|()| ExitCode::SUCCESS),
        Command::Log(args) => commands::history::run(&ctx, args).map(|()| ExitCode::SUCCESS),
        Command::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}
