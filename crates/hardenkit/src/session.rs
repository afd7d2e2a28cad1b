//! Command handler tying registry, engine, report store, and comparator
//!
//! A [`Session`] owns every piece of orchestrator state. Front ends send it
//! [`SessionCommand`]s, either by calling [`Session::handle`] directly or by
//! driving [`Session::serve`] over a channel. Errors come back as
//! [`SessionResponse::Rejected`]; the session itself never stops on one.

use std::fs;
use std::path::Path;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use crate::compare::{Comparator, ComparisonResult};
use crate::context::{CancelSignal, OutputSink};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::report::{Report, ReportStore};
use crate::types::{ExecutionResult, Label, Module};

/// Default per-run timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Id of the built-in audit report module
pub const DEFAULT_REPORT_MODULE: &str = "audit-report";

/// Key of an audit module's last output line (`report=/abs/path`) naming the
/// file it wrote the report to
pub const REPORT_FILE_KEY: &str = "report";

#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Run one module; `timeout` overrides the session default
    RunModule {
        id: String,
        args: Vec<String>,
        timeout: Option<Duration>,
    },
    /// Run the audit report module and store its output
    GenerateReport { scan_type: String },
    /// Compare two stored reports given as paths
    CompareReports { pre: String, post: String },
    ListModules,
    Exit,
}

#[derive(Debug)]
pub enum SessionResponse {
    Ran(ExecutionResult),
    /// The audit run, and the saved report when it succeeded
    Report {
        execution: ExecutionResult,
        report: Option<Report>,
    },
    Compared(ComparisonResult),
    Modules(Vec<Module>),
    Rejected(Error),
    Exit,
}

/// A command sent to [`Session::serve`] with the channel for its answer
pub struct Request {
    pub command: SessionCommand,
    pub reply: Sender<SessionResponse>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub timeout: Duration,
    pub report_module: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            report_module: DEFAULT_REPORT_MODULE.to_string(),
        }
    }
}

pub struct Session {
    registry: Registry,
    engine: Engine,
    store: ReportStore,
    comparator: Comparator,
    settings: Settings,
}

impl Session {
    pub fn new(
        registry: Registry,
        engine: Engine,
        store: ReportStore,
        comparator: Comparator,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            engine,
            store,
            comparator,
            settings,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Handle one command. Never panics on bad input and never ends the session.
    pub fn handle(
        &mut self,
        command: SessionCommand,
        sink: &mut dyn OutputSink,
        cancel: &dyn CancelSignal,
    ) -> SessionResponse {
        log::debug!("Handling {:?}", command);
        let response = match command {
            SessionCommand::RunModule { id, args, timeout } => {
                self.run_module(&id, &args, timeout, sink, cancel)
            }
            SessionCommand::GenerateReport { scan_type } => {
                self.generate_report(&scan_type, sink, cancel)
            }
            SessionCommand::CompareReports { pre, post } => self
                .compare_reports(&pre, &post)
                .map(SessionResponse::Compared),
            SessionCommand::ListModules => {
                Ok(SessionResponse::Modules(self.registry.list().to_vec()))
            }
            SessionCommand::Exit => Ok(SessionResponse::Exit),
        };
        response.unwrap_or_else(|e| {
            log::debug!("Rejected: {}", e);
            SessionResponse::Rejected(e)
        })
    }

    /// Answer requests until [`SessionCommand::Exit`] or the sender hangs up
    pub fn serve(
        &mut self,
        requests: Receiver<Request>,
        sink: &mut dyn OutputSink,
        cancel: &dyn CancelSignal,
    ) {
        for Request { command, reply } in requests {
            let exit = matches!(command, SessionCommand::Exit);
            let response = self.handle(command, sink, cancel);
            if reply.send(response).is_err() {
                log::debug!("Requester went away before the reply");
            }
            if exit {
                break;
            }
        }
    }

    fn run_module(
        &mut self,
        id: &str,
        args: &[String],
        timeout: Option<Duration>,
        sink: &mut dyn OutputSink,
        cancel: &dyn CancelSignal,
    ) -> Result<SessionResponse> {
        let module = self.registry.lookup(id)?;
        let timeout = timeout.unwrap_or(self.settings.timeout);
        let result = self.engine.run(module, args, timeout, sink, cancel);
        Ok(SessionResponse::Ran(result))
    }

    fn generate_report(
        &mut self,
        scan_type: &str,
        sink: &mut dyn OutputSink,
        cancel: &dyn CancelSignal,
    ) -> Result<SessionResponse> {
        // Validate before anything runs
        let label: Label = scan_type.parse()?;
        let module = self.registry.report_module(&self.settings.report_module)?;

        let args = [label.as_str().to_string()];
        let execution = self
            .engine
            .run(module, &args, self.settings.timeout, sink, cancel);

        let report = if execution.is_success() {
            let content = report_content(&execution.stdout)?;
            Some(self.store.save(label, &content)?)
        } else {
            None
        };
        Ok(SessionResponse::Report { execution, report })
    }

    fn compare_reports(&self, pre: &str, post: &str) -> Result<ComparisonResult> {
        let pre = self.store.load_as(pre, Label::Pre)?;
        let post = self.store.load_as(post, Label::Post)?;
        self.comparator.compare(&pre, &post)
    }
}

/// The report an audit run produced.
///
/// Wrappers around tools like Lynis print console progress and write the
/// machine-readable report elsewhere; they end their output with
/// `report=<absolute path>`. Otherwise stdout is the report.
fn report_content(stdout: &str) -> Result<String> {
    let named = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.trim().strip_prefix(REPORT_FILE_KEY))
        .and_then(|rest| rest.trim_start().strip_prefix('='))
        .map(|path| Path::new(path.trim()))
        .filter(|path| path.is_absolute());

    match named {
        Some(path) => {
            log::debug!("Reading audit report from {}", path.display());
            fs::read_to_string(path).map_err(|e| Error::io(path, e))
        }
        None => Ok(stdout.to_string()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::{DenyElevation, NeverCancel, NoElevation, NoOutput};
    use crate::journal::ExecutionLog;
    use crate::types::{
        Category, Idempotency, ModuleKind, Outcome, PrivilegeRequirement,
    };
    use std::os::unix::fs::PermissionsExt;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn module(id: &str, executable: std::path::PathBuf, kind: ModuleKind) -> Module {
        Module {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            executable,
            privilege: PrivilegeRequirement::required("changes system configuration"),
            category: Category::Audit,
            idempotency: Idempotency::Idempotent,
            kind,
        }
    }

    fn session(dir: &Path, modules: Vec<Module>, deny: bool) -> Session {
        let privilege: Box<dyn crate::context::PrivilegeProvider> = if deny {
            Box::new(DenyElevation)
        } else {
            Box::new(NoElevation)
        };
        let engine = Engine::new(privilege, ExecutionLog::in_memory())
            .with_grace(Duration::from_millis(200));
        Session::new(
            Registry::new(modules).unwrap(),
            engine,
            ReportStore::new(dir.join("reports")),
            Comparator::default(),
            Settings {
                timeout: Duration::from_secs(10),
                ..Settings::default()
            },
        )
    }

    /// Audit script that reports a different state per scan type
    fn audit_module(dir: &Path) -> Module {
        let path = script(
            dir,
            "audit_generate.sh",
            r##"echo "# lynis report"
echo "ssh_root_login=yes"
if [ "$1" = "post" ]; then
  echo "firewall=active"
else
  echo "telnet=installed"
fi"##,
        );
        module(DEFAULT_REPORT_MODULE, path, ModuleKind::AuditReport)
    }

    fn handle(session: &mut Session, command: SessionCommand) -> SessionResponse {
        session.handle(command, &mut NoOutput, &NeverCancel)
    }

    #[test]
    fn test_unknown_module_is_rejected_and_session_continues() {
        let dir = TempDir::new().unwrap();
        let mut s = session(dir.path(), vec![audit_module(dir.path())], false);

        let response = handle(
            &mut s,
            SessionCommand::RunModule {
                id: "nope".into(),
                args: vec![],
                timeout: None,
            },
        );
        assert!(matches!(
            response,
            SessionResponse::Rejected(Error::ModuleNotFound { ref id }) if id == "nope"
        ));

        let response = handle(&mut s, SessionCommand::ListModules);
        assert!(matches!(response, SessionResponse::Modules(ref m) if m.len() == 1));
    }

    #[test]
    fn test_run_module_uses_override_timeout() {
        let dir = TempDir::new().unwrap();
        let slow = module(
            "slow",
            script(dir.path(), "slow.sh", "sleep 5"),
            ModuleKind::Hardening,
        );
        let mut s = session(dir.path(), vec![slow], false);

        let response = handle(
            &mut s,
            SessionCommand::RunModule {
                id: "slow".into(),
                args: vec![],
                timeout: Some(Duration::from_millis(200)),
            },
        );
        let SessionResponse::Ran(result) = response else {
            panic!("expected a run result");
        };
        assert!(matches!(result.outcome, Outcome::TimedOut { .. }));
        assert_eq!(s.engine().log().entries().len(), 1);
    }

    #[test]
    fn test_invalid_scan_type_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let mut s = session(dir.path(), vec![audit_module(dir.path())], false);

        let response = handle(
            &mut s,
            SessionCommand::GenerateReport {
                scan_type: "during".into(),
            },
        );
        assert!(matches!(
            response,
            SessionResponse::Rejected(Error::InvalidScanType(_))
        ));
        assert!(s.engine().log().entries().is_empty());
    }

    #[test]
    fn test_generate_then_compare() {
        let dir = TempDir::new().unwrap();
        let mut s = session(dir.path(), vec![audit_module(dir.path())], false);

        let mut saved = Vec::new();
        for scan_type in ["PRE", " post "] {
            let response = handle(
                &mut s,
                SessionCommand::GenerateReport {
                    scan_type: scan_type.into(),
                },
            );
            let SessionResponse::Report {
                execution,
                report: Some(report),
            } = response
            else {
                panic!("expected a saved report");
            };
            assert!(execution.is_success());
            assert_eq!(report.raw_content, execution.stdout);
            saved.push(report.path);
        }

        let response = handle(
            &mut s,
            SessionCommand::CompareReports {
                pre: saved[0].display().to_string(),
                post: saved[1].display().to_string(),
            },
        );
        let SessionResponse::Compared(result) = response else {
            panic!("expected a comparison");
        };
        let added: Vec<_> = result.added.iter().map(|f| f.id.as_str()).collect();
        let removed: Vec<_> = result.removed.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(added, ["firewall"]);
        assert_eq!(removed, ["telnet"]);
        assert!(result.changed.is_empty());
    }

    #[test]
    fn test_denied_audit_saves_no_report() {
        let dir = TempDir::new().unwrap();
        let mut s = session(dir.path(), vec![audit_module(dir.path())], true);

        let response = handle(
            &mut s,
            SessionCommand::GenerateReport {
                scan_type: "pre".into(),
            },
        );
        let SessionResponse::Report { execution, report } = response else {
            panic!("expected a report response");
        };
        assert_eq!(execution.outcome, Outcome::PrivilegeDenied);
        assert!(report.is_none());
        assert!(s.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_compare_missing_report_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut s = session(dir.path(), vec![audit_module(dir.path())], false);

        let response = handle(
            &mut s,
            SessionCommand::CompareReports {
                pre: dir.path().join("missing.txt").display().to_string(),
                post: "  ".into(),
            },
        );
        assert!(matches!(
            response,
            SessionResponse::Rejected(Error::ReportNotFound { .. })
        ));
    }

    #[test]
    fn test_serve_answers_until_exit() {
        let dir = TempDir::new().unwrap();
        let mut s = session(dir.path(), vec![audit_module(dir.path())], false);

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            s.serve(rx, &mut NoOutput, &NeverCancel);
        });

        let ask = |command| {
            let (reply, answer) = mpsc::channel();
            tx.send(Request { command, reply }).unwrap();
            answer.recv().unwrap()
        };

        assert!(matches!(
            ask(SessionCommand::ListModules),
            SessionResponse::Modules(_)
        ));
        assert!(matches!(ask(SessionCommand::Exit), SessionResponse::Exit));
        worker.join().unwrap();
    }

    #[test]
    fn test_report_file_named_by_audit_output() {
        let dir = TempDir::new().unwrap();
        let report_file = dir.path().join("lynis-report.dat");
        let path = script(
            dir.path(),
            "audit_generate.sh",
            &format!(
                "echo '[+] Initializing program'\n\
                 printf 'hardening_index=71\\nfirewall_active=1\\n' > '{file}'\n\
                 echo '[+] Scan complete'\n\
                 echo 'report={file}'",
                file = report_file.display()
            ),
        );
        let audit = module(DEFAULT_REPORT_MODULE, path, ModuleKind::AuditReport);
        let mut s = session(dir.path(), vec![audit], false);

        let response = handle(
            &mut s,
            SessionCommand::GenerateReport {
                scan_type: "pre".into(),
            },
        );
        let SessionResponse::Report {
            report: Some(report),
            ..
        } = response
        else {
            panic!("expected a saved report");
        };
        assert_eq!(report.raw_content, "hardening_index=71\nfirewall_active=1\n");
    }

    #[test]
    fn test_report_content_falls_back_to_stdout() {
        assert_eq!(
            report_content("hardening_index=50\n").unwrap(),
            "hardening_index=50\n"
        );
        // Relative paths are treated as ordinary findings
        assert_eq!(
            report_content("report=relative.dat\n").unwrap(),
            "report=relative.dat\n"
        );
        assert!(matches!(
            report_content("report=/nonexistent/lynis-report.dat\n"),
            Err(Error::Io { .. })
        ));
    }
}
