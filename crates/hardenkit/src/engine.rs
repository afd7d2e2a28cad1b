//! Execution engine - runs one module as a supervised child process
//!
//! The engine:
//! 1. Checks the executable exists and is executable (nothing is spawned otherwise)
//! 2. Asks the privilege provider for elevation when the module needs it
//! 3. Spawns the child in its own process group, stdin detached
//! 4. Streams stdout/stderr to the caller while buffering them
//! 5. Enforces the timeout and cancellation by terminating the whole group
//! 6. Classifies the outcome and appends the record to the execution log
//!
//! Failures are returned as an [`ExecutionResult`], never as an error.
//! Modules are never retried here; whether a hardening step can be safely
//! repeated is the caller's decision.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::context::{CancelSignal, OutputSink, PrivilegeProvider};
use crate::journal::ExecutionLog;
use crate::types::{ExecutionResult, Module, Outcome, PrivilegeRequirement, Stream};

/// Time between SIGTERM and SIGKILL when terminating a module
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to keep collecting output after the main process exited
const DRAIN_WINDOW: Duration = Duration::from_secs(1);

/// How long a killed group may take to disappear before it counts as surviving
const SETTLE_WINDOW: Duration = Duration::from_millis(500);

/// Spawn attempts when the script is still open for writing (ETXTBSY)
const SPAWN_ATTEMPTS: u32 = 5;

type Chunk = (Stream, Vec<u8>);

/// Runs modules one at a time and records every result
pub struct Engine {
    privilege: Box<dyn PrivilegeProvider>,
    log: ExecutionLog,
    grace: Duration,
}

/// How supervision of a running child ended
enum Ending {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    WaitFailed(String),
}

impl Engine {
    pub fn new(privilege: Box<dyn PrivilegeProvider>, log: ExecutionLog) -> Self {
        Self {
            privilege,
            log,
            grace: DEFAULT_GRACE,
        }
    }

    /// Set the SIGTERM → SIGKILL grace period
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    /// Run a module to completion, timeout, or cancellation.
    ///
    /// Blocks the caller until the child is gone. Exactly one record is
    /// appended to the execution log per call.
    pub fn run(
        &mut self,
        module: &Module,
        args: &[String],
        timeout: Duration,
        sink: &mut dyn OutputSink,
        cancel: &dyn CancelSignal,
    ) -> ExecutionResult {
        let result = self.execute(module, args, timeout, sink, cancel);
        log::info!(
            "{} finished: {} ({} ms)",
            module.id,
            result.outcome.label(),
            result.duration().num_milliseconds()
        );
        if let Err(e) = self.log.append(result.clone()) {
            log::warn!("Could not persist {} run: {}", module.id, e);
        }
        result
    }

    fn execute(
        &self,
        module: &Module,
        args: &[String],
        timeout: Duration,
        sink: &mut dyn OutputSink,
        cancel: &dyn CancelSignal,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let record = Record {
            module,
            args,
            started_at,
        };

        if let Err(reason) = check_executable(&module.executable) {
            log::warn!("{}: {}", module.id, reason);
            return record.unspawned(Outcome::ExecutableMissing, reason);
        }

        let mut command = match &module.privilege {
            PrivilegeRequirement::Required { reason } => {
                if let Err(e) = self.privilege.ensure(module, reason) {
                    log::warn!("{}: {}", module.id, e);
                    return record.unspawned(Outcome::PrivilegeDenied, e.to_string());
                }
                self.privilege.command(&module.executable)
            }
            PrivilegeRequirement::None => Command::new(&module.executable),
        };

        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // New process group so the whole tree can be signalled, and so a
            // terminal interrupt reaches only the orchestrator.
            command.process_group(0);
        }

        log::debug!("Spawning {:?}", command);
        let mut child = match spawn(&mut command) {
            Ok(child) => child,
            Err(e) => {
                let outcome = match e.kind() {
                    io::ErrorKind::NotFound if module.requires_privilege() => {
                        Outcome::PrivilegeDenied
                    }
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                        Outcome::ExecutableMissing
                    }
                    _ => Outcome::Failed { exit_code: None },
                };
                return record.unspawned(outcome, format!("failed to start: {e}"));
            }
        };
        let pid = child.id();

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(pump(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(pump(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut output = Captured::default();
        let deadline = Instant::now().checked_add(timeout);
        let ending = supervise(&mut child, &rx, &mut output, sink, cancel, deadline);

        let privileged = module
            .requires_privilege()
            .then_some(&*self.privilege);
        let mut stop = |outcome: Outcome, reason: String| {
            let ended = terminate(&mut child, self.grace, privileged);
            let detail = if ended.survivors {
                format!("{reason}; processes in group {pid} survived SIGKILL")
            } else {
                reason
            };
            (ended.status, outcome, Some(detail))
        };

        let (status, outcome, detail) = match ending {
            Ending::Exited(status) => {
                let (outcome, detail) = classify(status);
                (Some(status), outcome, detail)
            }
            Ending::TimedOut => {
                log::warn!("{} exceeded {:?}, terminating", module.id, timeout);
                stop(
                    Outcome::TimedOut {
                        after_secs: timeout.as_secs(),
                    },
                    format!("exceeded {timeout:?} timeout"),
                )
            }
            Ending::Cancelled => {
                log::warn!("{} cancelled, terminating", module.id);
                stop(Outcome::Cancelled, "interrupted by user".to_string())
            }
            Ending::WaitFailed(e) => stop(
                Outcome::Failed { exit_code: None },
                format!("lost track of process: {e}"),
            ),
        };

        // Pick up whatever the dying group flushed
        drain(&rx, &mut output, sink, POLL_INTERVAL * 8);
        for reader in readers {
            if reader.is_finished() {
                let _ = reader.join();
            }
        }

        record.finish(
            Some(pid),
            status.and_then(|s| s.code()),
            output,
            outcome,
            detail,
        )
    }
}

/// Fields shared by every result of one run
struct Record<'a> {
    module: &'a Module,
    args: &'a [String],
    started_at: DateTime<Utc>,
}

impl Record<'_> {
    fn unspawned(&self, outcome: Outcome, detail: String) -> ExecutionResult {
        self.finish(None, None, Captured::default(), outcome, Some(detail))
    }

    fn finish(
        &self,
        pid: Option<u32>,
        exit_status: Option<i32>,
        output: Captured,
        outcome: Outcome,
        detail: Option<String>,
    ) -> ExecutionResult {
        // Wall clock may step backwards; the record must not.
        let finished_at = Utc::now().max(self.started_at);
        ExecutionResult {
            module_id: self.module.id.clone(),
            executable: self.module.executable.clone(),
            args: self.args.to_vec(),
            pid,
            started_at: self.started_at,
            finished_at,
            exit_status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            outcome,
            detail,
        }
    }
}

#[derive(Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Captured {
    fn push(&mut self, stream: Stream, bytes: &[u8], sink: &mut dyn OutputSink) {
        match stream {
            Stream::Stdout => self.stdout.extend_from_slice(bytes),
            Stream::Stderr => self.stderr.extend_from_slice(bytes),
        }
        let line = String::from_utf8_lossy(bytes);
        sink.line(stream, line.trim_end_matches(['\n', '\r']));
    }
}

fn check_executable(path: &Path) -> Result<(), String> {
    let meta =
        fs::metadata(path).map_err(|_| format!("script not found: {}", path.display()))?;
    if !meta.is_file() {
        return Err(format!("not a file: {}", path.display()));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(format!("not executable: {}", path.display()));
        }
    }
    Ok(())
}

fn spawn(command: &mut Command) -> io::Result<Child> {
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Err(e) if is_text_busy(&e) && attempt < SPAWN_ATTEMPTS => {
                attempt += 1;
                log::debug!("Executable busy, retrying spawn ({attempt}/{SPAWN_ATTEMPTS})");
                thread::sleep(Duration::from_millis(20 * u64::from(attempt)));
            }
            other => return other,
        }
    }
}

#[cfg(unix)]
fn is_text_busy(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ETXTBSY)
}

#[cfg(not(unix))]
fn is_text_busy(_e: &io::Error) -> bool {
    false
}

/// Forward lines from a child pipe to the engine thread
fn pump<R: Read + Send + 'static>(
    source: R,
    stream: Stream,
    tx: Sender<Chunk>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
    })
}

fn supervise(
    child: &mut Child,
    rx: &Receiver<Chunk>,
    output: &mut Captured,
    sink: &mut dyn OutputSink,
    cancel: &dyn CancelSignal,
    deadline: Option<Instant>,
) -> Ending {
    let mut status: Option<ExitStatus> = None;
    let mut exited_at: Option<Instant> = None;
    let mut streams_closed = false;

    loop {
        if streams_closed {
            thread::sleep(POLL_INTERVAL);
        } else {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok((stream, bytes)) => output.push(stream, &bytes, sink),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => streams_closed = true,
            }
        }

        if status.is_none() {
            match child.try_wait() {
                Ok(Some(s)) => {
                    status = Some(s);
                    exited_at = Some(Instant::now());
                }
                Ok(None) => {}
                Err(e) => return Ending::WaitFailed(e.to_string()),
            }
        }

        if let Some(s) = status {
            // Background children may keep the pipes open; stop waiting for
            // them. The run already finished, so a deadline or interrupt
            // during the drain cannot turn it into a failure.
            let drained = exited_at.is_some_and(|t| t.elapsed() >= DRAIN_WINDOW);
            let stopped = cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d);
            if streams_closed || drained || stopped {
                return Ending::Exited(s);
            }
            continue;
        }

        if cancel.is_cancelled() {
            return Ending::Cancelled;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ending::TimedOut;
        }
    }
}

fn drain(rx: &Receiver<Chunk>, output: &mut Captured, sink: &mut dyn OutputSink, window: Duration) {
    let until = Instant::now() + window;
    while let Some(left) = until.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok((stream, bytes)) => output.push(stream, &bytes, sink),
            Err(_) => break,
        }
    }
}

fn classify(status: ExitStatus) -> (Outcome, Option<String>) {
    match status.code() {
        Some(0) => (Outcome::Success, None),
        Some(code) => (
            Outcome::Failed {
                exit_code: Some(code),
            },
            Some(format!("exited with code {code}")),
        ),
        None => (Outcome::Failed { exit_code: None }, Some(describe_signal(status))),
    }
}

#[cfg(unix)]
fn describe_signal(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map_or_else(
        || "terminated abnormally".to_string(),
        |sig| format!("terminated by signal {sig}"),
    )
}

#[cfg(not(unix))]
fn describe_signal(_status: ExitStatus) -> String {
    "terminated abnormally".to_string()
}

/// How a terminated group ended
struct Termination {
    status: Option<ExitStatus>,
    /// Members of the group were still alive after SIGKILL
    survivors: bool,
}

/// Terminate the child's process group: SIGTERM, grace period, SIGKILL.
///
/// A group that outlives the grace period in a privileged run is also handed
/// to the privilege provider, since members running as another user ignore
/// our own SIGKILL. Always reaps the child before returning.
fn terminate(
    child: &mut Child,
    grace: Duration,
    privileged: Option<&dyn PrivilegeProvider>,
) -> Termination {
    let pid = child.id();
    #[cfg(unix)]
    signal_group(pid, libc::SIGTERM);
    #[cfg(not(unix))]
    let _ = child.kill();

    let until = Instant::now() + grace;
    let mut status = None;
    while Instant::now() < until {
        match child.try_wait() {
            Ok(Some(s)) => {
                status = Some(s);
                break;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => break,
        }
    }

    if let Some(provider) = privileged
        && (status.is_none() || group_alive(pid))
    {
        log::debug!("Killing process group {} through the privilege provider", pid);
        if let Err(e) = provider.kill_group(pid) {
            log::warn!("Could not kill privileged process group {}: {}", pid, e);
        }
    }

    // Stragglers in the group that ignored SIGTERM
    #[cfg(unix)]
    signal_group(pid, libc::SIGKILL);

    if status.is_none() {
        let _ = child.kill();
        status = child.wait().ok();
    }

    let survivors = !group_settles(pid, SETTLE_WINDOW);
    if survivors {
        log::warn!("Process group {} still has running members after SIGKILL", pid);
    } else {
        log::debug!("Process group {} terminated", pid);
    }
    Termination { status, survivors }
}

/// Wait for a killed group to empty. False if members remain after `within`.
fn group_settles(pgid: u32, within: Duration) -> bool {
    let until = Instant::now() + within;
    loop {
        if !group_alive(pgid) {
            return true;
        }
        if Instant::now() >= until {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn group_alive(pgid: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    // SAFETY: signal 0 delivers nothing and only probes the group for members
    let rc = unsafe { libc::killpg(pgid, 0) };
    // EPERM: members exist but belong to another user
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn group_alive(_pgid: u32) -> bool {
    false
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only delivers a signal. The group id is the child's pid,
    // which leads its own group because it was spawned with process_group(0).
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc != 0 {
        log::debug!(
            "killpg({}, {}) failed: {}",
            pgid,
            signal,
            io::Error::last_os_error()
        );
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::{DenyElevation, NeverCancel, NoElevation, NoOutput};
    use crate::types::{Category, Idempotency, ModuleKind};
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const LONG: Duration = Duration::from_secs(30);

    #[derive(Default)]
    struct Lines(Vec<(Stream, String)>);

    impl OutputSink for Lines {
        fn line(&mut self, stream: Stream, line: &str) {
            self.0.push((stream, line.to_string()));
        }
    }

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn module(id: &str, executable: PathBuf) -> Module {
        Module {
            id: id.to_string(),
            display_name: id.to_string(),
            executable,
            privilege: PrivilegeRequirement::None,
            category: Category::Firewall,
            idempotency: Idempotency::Idempotent,
            kind: ModuleKind::Hardening,
        }
    }

    fn engine() -> Engine {
        Engine::new(Box::new(NoElevation), ExecutionLog::in_memory())
            .with_grace(Duration::from_millis(500))
    }

    /// Killed processes may linger briefly as zombies before being reaped
    fn process_gone(pid: u32) -> bool {
        let until = Instant::now() + Duration::from_secs(2);
        loop {
            let gone = match fs::read_to_string(format!("/proc/{pid}/stat")) {
                Ok(stat) => stat
                    .rsplit_once(')')
                    .is_some_and(|(_, rest)| rest.trim_start().starts_with(['Z', 'X'])),
                // SAFETY: signal 0 only checks for existence
                Err(_) => unsafe { libc::kill(pid as libc::pid_t, 0) == -1 },
            };
            if gone || Instant::now() >= until {
                return gone;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Script that leaves a background child and records its pid
    fn script_with_background_child(dir: &TempDir, name: &str) -> (PathBuf, PathBuf) {
        let pidfile = dir.path().join("child.pid");
        let path = script(
            dir,
            name,
            &format!("sleep 30 &\necho $! > '{}'\nwait", pidfile.display()),
        );
        (path, pidfile)
    }

    fn background_pid(pidfile: &Path) -> u32 {
        fs::read_to_string(pidfile).unwrap().trim().parse().unwrap()
    }

    /// Provider that records escalated kills and performs them as the current user
    struct RecordingKill(Arc<Mutex<Vec<u32>>>);

    impl PrivilegeProvider for RecordingKill {
        fn ensure(&self, _module: &Module, _reason: &str) -> crate::error::Result<()> {
            Ok(())
        }

        fn command(&self, program: &Path) -> Command {
            Command::new(program)
        }

        fn kill_group(&self, pgid: u32) -> io::Result<()> {
            self.0.lock().unwrap().push(pgid);
            signal_group(pgid, libc::SIGKILL);
            Ok(())
        }
    }

    #[test]
    fn test_missing_executable_is_structured_result() {
        let dir = TempDir::new().unwrap();
        let firewall = module("firewall", dir.path().join("firewall_hardening.sh"));
        let mut engine = engine();

        let result = engine.run(&firewall, &[], LONG, &mut NoOutput, &NeverCancel);

        assert_eq!(result.outcome, Outcome::ExecutableMissing);
        assert_eq!(result.pid, None);
        assert!(result.detail.unwrap().contains("firewall_hardening.sh"));
        assert_eq!(engine.log().entries().len(), 1);
    }

    #[test]
    fn test_non_executable_file_is_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kernel_hardening.sh");
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let result = engine().run(
            &module("kernel", path),
            &[],
            LONG,
            &mut NoOutput,
            &NeverCancel,
        );
        assert_eq!(result.outcome, Outcome::ExecutableMissing);
    }

    #[test]
    fn test_success_streams_and_captures_output() {
        let dir = TempDir::new().unwrap();
        let path = script(
            &dir,
            "ssh_hardening.sh",
            "echo 'disabling root login'\necho 'warn: no banner' >&2\necho done",
        );
        let mut sink = Lines::default();

        let result = engine().run(&module("ssh", path), &[], LONG, &mut sink, &NeverCancel);

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.exit_status, Some(0));
        assert_eq!(result.stdout, "disabling root login\ndone\n");
        assert_eq!(result.stderr, "warn: no banner\n");
        assert!(result.finished_at >= result.started_at);

        let stdout: Vec<_> = sink
            .0
            .iter()
            .filter(|(s, _)| *s == Stream::Stdout)
            .map(|(_, l)| l.as_str())
            .collect();
        assert_eq!(stdout, ["disabling root login", "done"]);
        assert!(sink.0.contains(&(Stream::Stderr, "warn: no banner".to_string())));
    }

    #[test]
    fn test_nonzero_exit_is_failed_with_code() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "update_system.sh", "echo 'apt lock held' >&2\nexit 3");

        let result = engine().run(
            &module("update", path),
            &[],
            LONG,
            &mut NoOutput,
            &NeverCancel,
        );

        assert_eq!(result.outcome, Outcome::Failed { exit_code: Some(3) });
        assert_eq!(result.exit_status, Some(3));
        assert_eq!(result.stderr, "apt lock held\n");
    }

    #[test]
    fn test_args_are_passed_through() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "audit_generate.sh", "echo \"scan=$1\"");

        let result = engine().run(
            &module("audit-report", path),
            &["post".to_string()],
            LONG,
            &mut NoOutput,
            &NeverCancel,
        );

        assert_eq!(result.stdout, "scan=post\n");
        assert_eq!(result.args, ["post"]);
    }

    #[test]
    fn test_timeout_terminates_and_reaps_child() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "kernel_hardening.sh", "echo start\nsleep 30");
        let started = Instant::now();

        let result = engine().run(
            &module("kernel", path),
            &[],
            Duration::from_millis(300),
            &mut NoOutput,
            &NeverCancel,
        );

        assert_eq!(result.outcome, Outcome::TimedOut { after_secs: 0 });
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(result.stdout, "start\n");
        assert!(process_gone(result.pid.unwrap()));
    }

    #[test]
    fn test_timeout_kills_group_ignoring_sigterm() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "service_cleanup.sh", "trap '' TERM\nsleep 30\nsleep 30");
        let started = Instant::now();

        let result = engine().run(
            &module("services", path),
            &[],
            Duration::from_millis(200),
            &mut NoOutput,
            &NeverCancel,
        );

        assert!(matches!(result.outcome, Outcome::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(process_gone(result.pid.unwrap()));
    }

    #[test]
    fn test_cancel_marks_result_cancelled() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "auditd_configure.sh", "sleep 30");
        let cancel = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&cancel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.store(true, Ordering::SeqCst);
        });

        let result = engine().run(
            &module("auditd", path),
            &[],
            LONG,
            &mut NoOutput,
            &cancel,
        );
        handle.join().unwrap();

        assert_eq!(result.outcome, Outcome::Cancelled);
        assert!(process_gone(result.pid.unwrap()));
    }

    #[test]
    fn test_privilege_denied_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let path = script(
            &dir,
            "firewall_hardening.sh",
            &format!("touch '{}'", marker.display()),
        );
        let mut firewall = module("firewall", path);
        firewall.privilege = PrivilegeRequirement::required("modifies iptables rules");

        let mut engine = Engine::new(Box::new(DenyElevation), ExecutionLog::in_memory());
        let result = engine.run(&firewall, &[], LONG, &mut NoOutput, &NeverCancel);

        assert_eq!(result.outcome, Outcome::PrivilegeDenied);
        assert_eq!(result.pid, None);
        assert!(!marker.exists());
        assert_eq!(engine.log().entries().len(), 1);
    }

    #[test]
    fn test_privileged_module_runs_through_provider() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "firewall_hardening.sh", "echo applied");
        let mut firewall = module("firewall", path);
        firewall.privilege = PrivilegeRequirement::required("modifies iptables rules");

        let result = engine().run(&firewall, &[], LONG, &mut NoOutput, &NeverCancel);
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.stdout, "applied\n");
    }

    #[test]
    fn test_background_child_holding_pipe_does_not_hang() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "service_cleanup.sh", "sleep 5 &\necho restarted");
        let started = Instant::now();

        let result = engine().run(
            &module("services", path),
            &[],
            LONG,
            &mut NoOutput,
            &NeverCancel,
        );

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.stdout, "restarted\n");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_kills_background_children() {
        let dir = TempDir::new().unwrap();
        let (path, pidfile) = script_with_background_child(&dir, "service_cleanup.sh");

        let result = engine().run(
            &module("services", path),
            &[],
            Duration::from_millis(300),
            &mut NoOutput,
            &NeverCancel,
        );

        assert!(matches!(result.outcome, Outcome::TimedOut { .. }));
        assert!(process_gone(result.pid.unwrap()));
        assert!(process_gone(background_pid(&pidfile)));
    }

    #[test]
    fn test_cancel_kills_background_children() {
        let dir = TempDir::new().unwrap();
        let (path, pidfile) = script_with_background_child(&dir, "auditd_configure.sh");
        let cancel = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&cancel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            trigger.store(true, Ordering::SeqCst);
        });

        let result = engine().run(&module("auditd", path), &[], LONG, &mut NoOutput, &cancel);
        handle.join().unwrap();

        assert_eq!(result.outcome, Outcome::Cancelled);
        assert!(process_gone(background_pid(&pidfile)));
    }

    #[test]
    fn test_privileged_group_outliving_grace_is_escalated() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "kernel_hardening.sh", "trap '' TERM\nsleep 30");
        let mut kernel = module("kernel", path);
        kernel.privilege = PrivilegeRequirement::required("writes sysctl settings");

        let killed = Arc::new(Mutex::new(Vec::new()));
        let mut engine = Engine::new(
            Box::new(RecordingKill(Arc::clone(&killed))),
            ExecutionLog::in_memory(),
        )
        .with_grace(Duration::from_millis(200));

        let result = engine.run(
            &kernel,
            &[],
            Duration::from_millis(200),
            &mut NoOutput,
            &NeverCancel,
        );

        assert!(matches!(result.outcome, Outcome::TimedOut { .. }));
        assert_eq!(*killed.lock().unwrap(), [result.pid.unwrap()]);
        assert!(process_gone(result.pid.unwrap()));
    }

    #[test]
    fn test_unprivileged_timeout_does_not_escalate() {
        let dir = TempDir::new().unwrap();
        let path = script(&dir, "kernel_hardening.sh", "trap '' TERM\nsleep 30");

        let killed = Arc::new(Mutex::new(Vec::new()));
        let mut engine = Engine::new(
            Box::new(RecordingKill(Arc::clone(&killed))),
            ExecutionLog::in_memory(),
        )
        .with_grace(Duration::from_millis(200));

        let result = engine.run(
            &module("kernel", path),
            &[],
            Duration::from_millis(200),
            &mut NoOutput,
            &NeverCancel,
        );

        assert!(matches!(result.outcome, Outcome::TimedOut { .. }));
        assert!(killed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_exit_before_deadline_is_success_during_drain() {
        let dir = TempDir::new().unwrap();
        // Exits at ~300 ms while the background sleep keeps the pipe open
        // past the 600 ms deadline
        let path = script(&dir, "update_system.sh", "sleep 3 &\nsleep 0.3\necho updated");

        let result = engine().run(
            &module("update", path),
            &[],
            Duration::from_millis(600),
            &mut NoOutput,
            &NeverCancel,
        );

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.stdout, "updated\n");
    }
}
