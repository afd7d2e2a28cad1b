use anyhow::Result;
use colored::Colorize;
use hardenkit::{ExecutionLog, ExecutionResult};

use crate::Context;
use crate::cli::LogArgs;
use crate::ui;

pub fn run(ctx: &Context, args: LogArgs) -> Result<()> {
    let path = ctx.layout.log_file();
    let history = ExecutionLog::history(&path)?;
    let shown = tail(&history, args.limit);

    if args.json {
        for result in shown {
            println!("{}", serde_json::to_string(result)?);
        }
        return Ok(());
    }

    ui::header("Execution History");
    if shown.is_empty() {
        ui::dim("No runs recorded yet");
        return Ok(());
    }

    for result in shown {
        let glyph = if result.is_success() {
            "✓".green()
        } else {
            "✗".red()
        };
        let args = if result.args.is_empty() {
            String::new()
        } else {
            format!(" {}", ui::truncate(&result.args.join(" "), 30))
        };
        println!(
            "  {} {}  {:<18} {:<16} {}",
            glyph,
            result
                .started_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            format!("{}{}", result.module_id, args),
            result.outcome.label(),
            format!("{:.1}s", result.duration().num_milliseconds() as f64 / 1000.0).dimmed()
        );
        if ctx.verbose > 0
            && let Some(detail) = &result.detail
        {
            ui::dim(detail);
        }
    }

    if !ctx.quiet {
        println!();
        ui::kv("Log", &path.display().to_string());
    }
    Ok(())
}

/// Last `limit` entries, oldest first
fn tail(history: &[ExecutionResult], limit: Option<usize>) -> &[ExecutionResult] {
    match limit {
        Some(n) if n < history.len() => &history[history.len() - n..],
        _ => history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hardenkit::Outcome;
    use std::path::PathBuf;

    fn entry(id: &str) -> ExecutionResult {
        let now = Utc::now();
        ExecutionResult {
            module_id: id.to_string(),
            executable: PathBuf::from("/s.sh"),
            args: vec![],
            pid: Some(1),
            started_at: now,
            finished_at: now,
            exit_status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            outcome: Outcome::Success,
            detail: None,
        }
    }

    #[test]
    fn test_tail_limits_to_most_recent() {
        let history = vec![entry("ssh"), entry("firewall"), entry("kernel")];
        let ids: Vec<_> = tail(&history, Some(2))
            .iter()
            .map(|r| r.module_id.as_str())
            .collect();
        assert_eq!(ids, ["firewall", "kernel"]);
        assert_eq!(tail(&history, Some(10)).len(), 3);
        assert_eq!(tail(&history, None).len(), 3);
        assert!(tail(&history, Some(0)).is_empty());
    }
}
