//! # Hardenkit
//!
//! Orchestration core for Linux hardening: run privileged hardening modules,
//! capture audit snapshots before and after, and compare them.
//!
//! ## Core Concepts
//!
//! - **Module**: A registered hardening action backed by an external executable
//! - **Engine**: Runs one module at a time with streaming output, a timeout,
//!   cancellation, and process-group cleanup
//! - **ExecutionLog**: Append-only record of every run
//! - **ReportStore**: Immutable, timestamped `pre`/`post` audit snapshots
//! - **Comparator**: Diffs two reports into added/removed/changed findings
//! - **Session**: Command handler that front ends drive
//!
//! ## Example
//!
//! ```ignore
//! use hardenkit::{
//!     Comparator, Engine, ExecutionLog, NeverCancel, NoElevation, NoOutput,
//!     Registry, ReportStore, Session, SessionCommand, Settings,
//! };
//!
//! let registry = Registry::new(modules)?;
//! let engine = Engine::new(Box::new(NoElevation), ExecutionLog::open(log_path));
//! let mut session = Session::new(
//!     registry,
//!     engine,
//!     ReportStore::new(reports_dir),
//!     Comparator::default(),
//!     Settings::default(),
//! );
//!
//! let response = session.handle(
//!     SessionCommand::GenerateReport { scan_type: "pre".into() },
//!     &mut NoOutput,
//!     &NeverCancel,
//! );
//! ```

pub mod compare;
pub mod context;
pub mod engine;
pub mod error;
pub mod journal;
pub mod registry;
pub mod report;
pub mod session;
pub mod types;

pub use compare::{
    Comparator, ComparisonResult, Finding, FindingChange, FindingParser, Findings,
    KeyValueParser,
};
pub use context::{
    CancelSignal, DenyElevation, NeverCancel, NoElevation, NoOutput, OutputSink,
    PrivilegeProvider,
};
pub use engine::{DEFAULT_GRACE, Engine};
pub use error::{Error, Result};
pub use journal::{ExecutionLog, LOG_FILE_NAME};
pub use registry::Registry;
pub use report::{Report, ReportStore, StoredReport};
pub use session::{
    DEFAULT_REPORT_MODULE, DEFAULT_TIMEOUT, REPORT_FILE_KEY, Request, Session, SessionCommand,
    SessionResponse, Settings,
};
pub use types::{
    Category, ExecutionResult, Idempotency, Label, Module, ModuleKind, Outcome,
    PrivilegeRequirement, Stream,
};
