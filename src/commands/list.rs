use anyhow::{Result, bail};
use colored::Colorize;
use hardenkit::{ModuleKind, SessionCommand, SessionResponse};

use super::{execute, open_session};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let mut session = open_session(ctx)?;
    let modules = match execute(&mut session, SessionCommand::ListModules) {
        SessionResponse::Modules(modules) => modules,
        SessionResponse::Rejected(e) => return Err(e.into()),
        other => bail!("Unexpected response: {:?}", other),
    };

    ui::header("Modules");
    for module in &modules {
        let present = if module.executable.is_file() {
            "✓".green()
        } else {
            "✗".red()
        };
        let mut tags = vec![module.category.to_string()];
        if module.kind == ModuleKind::AuditReport {
            tags.push("report".to_string());
        }
        if !module.is_idempotent() {
            tags.push("stateful".to_string());
        }
        if module.requires_privilege() {
            tags.push("sudo".to_string());
        }
        println!(
            "  {} {:<18} {:<24} {}",
            present,
            module.id.bold(),
            module.display_name,
            format!("[{}]", tags.join(", ")).dimmed()
        );
        if ctx.verbose > 0 {
            ui::dim(&module.executable.display().to_string());
        }
    }

    let missing = modules.iter().filter(|m| !m.executable.is_file()).count();
    if missing > 0 && !ctx.quiet {
        println!();
        ui::warn(&format!(
            "{} script(s) missing from {}",
            missing,
            ctx.layout.scripts_dir().display()
        ));
    }
    Ok(())
}
