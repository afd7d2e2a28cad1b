use anyhow::{Result, bail};
use hardenkit::{Label, Report, Session, SessionCommand, SessionResponse};
use std::process::ExitCode;

use super::{execute, open_session};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, scan_type: &str) -> Result<ExitCode> {
    // Reject bad input before sudo is ever requested
    let label: Label = scan_type.parse()?;
    let mut session = open_session(ctx)?;

    if !ctx.quiet {
        ui::header(&format!("Generating {} audit report", label));
        println!();
    }

    Ok(match generate(&mut session, label)? {
        Some(_) => ExitCode::SUCCESS,
        None => ExitCode::FAILURE,
    })
}

/// Run the report module and show where the report landed
pub fn generate(session: &mut Session, label: Label) -> Result<Option<Report>> {
    let command = SessionCommand::GenerateReport {
        scan_type: label.to_string(),
    };
    match execute(session, command) {
        SessionResponse::Report { execution, report } => {
            let name = format!("{} audit", label);
            ui::show_execution(&execution, &name);
            if let Some(report) = &report {
                ui::success(&format!("Report saved to {}", report.path.display()));
            }
            Ok(report)
        }
        SessionResponse::Rejected(e) => Err(e.into()),
        other => bail!("Unexpected response: {:?}", other),
    }
}
