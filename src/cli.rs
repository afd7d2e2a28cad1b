use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hardenctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Run Linux hardening modules and compare audit snapshots", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base directory holding bash-scripts/, logs/ and reports/
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Interactive numbered menu (default)
    Menu,

    /// List registered modules
    List,

    /// Run one module
    Run(RunArgs),

    /// Generate and store an audit report
    Audit {
        /// Scan type: pre or post
        scan_type: String,
    },

    /// Compare two audit reports
    Compare(CompareArgs),

    /// List stored reports, newest first
    Reports,

    /// Show execution history
    Log(LogArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Run
// ============================================================================

#[derive(Parser)]
pub struct RunArgs {
    /// Module id (see `hardenctl list`)
    pub module: String,

    /// Timeout in seconds (overrides config)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Arguments passed to the module script
    #[arg(last = true)]
    pub args: Vec<String>,
}

// ============================================================================
// Compare
// ============================================================================

#[derive(Parser)]
pub struct CompareArgs {
    /// Pre-hardening report path
    #[arg(required_unless_present = "latest", conflicts_with = "latest")]
    pub pre: Option<String>,

    /// Post-hardening report path
    #[arg(required_unless_present = "latest", conflicts_with = "latest")]
    pub post: Option<String>,

    /// Compare the newest stored pre and post reports
    #[arg(long)]
    pub latest: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Also save the comparison into the reports directory
    #[arg(long)]
    pub save: bool,
}

// ============================================================================
// Log
// ============================================================================

#[derive(Parser)]
pub struct LogArgs {
    /// Show only the most recent N runs
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output as JSON lines
    #[arg(long)]
    pub json: bool,
}
