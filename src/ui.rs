use colored::Colorize;
use hardenkit::{ComparisonResult, ExecutionResult, OutputSink, Stream};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print the hardenctl banner
pub fn banner() {
    println!(
        "{}",
        r#"
  ╦  ╦╔╗╔╦ ╦═╗ ╦  ╦ ╦╔═╗╦═╗╔╦╗╔═╗╔╗╔╦╔╗╔╔═╗
  ║  ║║║║║ ║╔╩╦╝  ╠═╣╠═╣╠╦╝ ║║║╣ ║║║║║║║║ ╦
  ╩═╝╩╝╚╝╚═╝╩ ╚═  ╩ ╩╩ ╩╩╚══╩╝╚═╝╝╚╝╩╝╚╝╚═╝
"#
        .cyan()
    );
}

// ============================================================================
// Module Output
// ============================================================================

/// Streams child output to the terminal as it arrives
pub struct TerminalSink;

impl OutputSink for TerminalSink {
    fn line(&mut self, stream: Stream, line: &str) {
        match stream {
            Stream::Stdout => println!("  {} {}", "│".dimmed(), line),
            Stream::Stderr => eprintln!("  {} {}", "│".red(), line),
        }
    }
}

/// Print the outcome of one run
pub fn show_execution(result: &ExecutionResult, name: &str) {
    let secs = result.duration().num_milliseconds() as f64 / 1000.0;
    println!();
    match result.error() {
        None => success(&format!("{} completed ({:.1}s)", name, secs)),
        Some(err) => {
            error(&format!("{} ({:.1}s)", err, secs));
            if let Some(detail) = &result.detail {
                dim(detail);
            }
            dim(err.advice());
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// Display a comparison in a user-friendly format
pub fn show_comparison(result: &ComparisonResult) {
    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Report Comparison".bold()
    );
    println!("│ {} {}", "pre: ".dimmed(), result.pre_ref.display());
    println!("│ {} {}", "post:".dimmed(), result.post_ref.display());
    println!("│");

    if result.is_empty() {
        println!("│   {} No differences", "✓".green());
        println!("└─────────────────────────────────────────────────────┘");
        return;
    }

    if !result.added.is_empty() {
        println!("│ {}", "Added".bold());
        for finding in &result.added {
            println!(
                "│   {} {:<30} {}",
                "+".green(),
                finding.id,
                finding.state.dimmed()
            );
        }
        println!("│");
    }

    if !result.removed.is_empty() {
        println!("│ {}", "Removed".bold());
        for finding in &result.removed {
            println!(
                "│   {} {:<30} {}",
                "-".red(),
                finding.id,
                finding.state.dimmed()
            );
        }
        println!("│");
    }

    if !result.changed.is_empty() {
        println!("│ {}", "Changed".bold());
        for change in &result.changed {
            println!(
                "│   {} {:<30} {} → {}",
                "~".yellow(),
                change.id,
                change.old.dimmed(),
                change.new
            );
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} differences ({} added, {} removed, {} changed)",
        result.total().to_string().bold(),
        result.added.len().to_string().green(),
        result.removed.len().to_string().red(),
        result.changed.len().to_string().yellow()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Truncate text for display, keeping the start
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = text.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}
