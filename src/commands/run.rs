use anyhow::{Result, bail};
use colored::Colorize;
use hardenkit::{SessionCommand, SessionResponse};
use std::process::ExitCode;
use std::time::Duration;

use super::{execute, open_session};
use crate::Context;
use crate::cli::RunArgs;
use crate::ui;

pub fn run(ctx: &Context, args: RunArgs) -> Result<ExitCode> {
    let mut session = open_session(ctx)?;
    let name = session.registry().lookup(&args.module)?.display_name.clone();

    if !ctx.quiet {
        ui::header(&format!("Running {}", name));
        if !args.args.is_empty() {
            ui::kv("Arguments", &args.args.join(" "));
        }
        println!();
    }

    let command = SessionCommand::RunModule {
        id: args.module,
        args: args.args,
        timeout: args.timeout.map(Duration::from_secs),
    };
    match execute(&mut session, command) {
        SessionResponse::Ran(result) => {
            ui::show_execution(&result, &name);
            if result.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                if let Some(path) = session.engine().log().path() {
                    ui::dim(&format!("Logged to {}", path.display().to_string().dimmed()));
                }
                Ok(ExitCode::FAILURE)
            }
        }
        SessionResponse::Rejected(e) => Err(e.into()),
        other => bail!("Unexpected response: {:?}", other),
    }
}
