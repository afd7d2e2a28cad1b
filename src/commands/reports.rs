use anyhow::Result;
use colored::Colorize;
use hardenkit::{Label, ReportStore};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let store = ReportStore::new(ctx.layout.reports_dir());
    let reports = store.list()?;

    ui::header("Stored Reports");
    if reports.is_empty() {
        ui::dim("No reports yet. Run: hardenctl audit pre");
        return Ok(());
    }

    for report in &reports {
        let label = match report.label {
            Label::Pre => "pre ".cyan(),
            Label::Post => "post".green(),
        };
        println!(
            "  {}  {}  {}",
            label,
            report
                .captured_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
                .dimmed(),
            report.path.display()
        );
    }

    if !ctx.quiet {
        let pre = reports.iter().filter(|r| r.label == Label::Pre).count();
        println!();
        ui::kv(
            "Total",
            &format!("{} ({} pre, {} post)", reports.len(), pre, reports.len() - pre),
        );
    }
    Ok(())
}
