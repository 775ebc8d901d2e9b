//! In-memory terminal sessions backed by OS subprocesses.
//!
//! A session is addressed by the pid of the subprocess that created it. The record
//! outlives the process and can be re-run with a new command once it has finished.
//! All state lives behind one mutex; every check-then-mutate sequence, including
//! the synchronous spawn, happens inside a single guard with no await point.

use crate::utils::subprocess::shell_command;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_READ_LINES: usize = 50;
pub const MAX_READ_LINES: usize = 15_000;
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 50;

/// How long exit finalisation waits for the output readers to drain.
const READER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TerminalError {
    #[error("Terminal PID {pid} not found")]
    NotFound { pid: u32, available: Vec<u32> },

    #[error("Terminal PID {pid} is already running")]
    AlreadyRunning { pid: u32, command: String },

    #[error("Terminal PID {pid} is not running")]
    NotRunning { pid: u32, status: SessionStatus },

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Failed to obtain terminal PID")]
    NoPid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputStream {
    #[serde(rename = "STDOUT")]
    Stdout,
    #[serde(rename = "STDERR")]
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "STDOUT",
            Self::Stderr => "STDERR",
        }
    }
}

/// One captured line of subprocess output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.stream.as_str(),
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.text
        )
    }
}

/// Signal choice for [`TerminalManager::kill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KillSignal {
    #[default]
    Term,
    Kill,
}

impl KillSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Term => "SIGTERM",
            Self::Kill => "SIGKILL",
        }
    }

    #[cfg(unix)]
    fn raw(self) -> libc::c_int {
        match self {
            Self::Term => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KillSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIGTERM" | "TERM" => Ok(Self::Term),
            "SIGKILL" | "KILL" => Ok(Self::Kill),
            other => Err(format!("unsupported signal '{other}' (expected SIGTERM or SIGKILL)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TerminalSession {
    pub pid: u32,
    /// Pid of the current (or most recent) subprocess. Differs from `pid` after a re-run.
    pub os_pid: Option<u32>,
    pub command: String,
    pub shell: String,
    pub cwd: PathBuf,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub output: Vec<OutputLine>,
    run: u64,
}

impl TerminalSession {
    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Output of one stream joined by newlines.
    pub fn stream_text(&self, stream: OutputStream) -> String {
        self.output
            .iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub shell: Option<String>,
    pub timeout_secs: u64,
    pub background: bool,
}

impl CreateOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            shell: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            background: false,
        }
    }

    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    #[must_use]
    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub session: TerminalSession,
    /// The most recent lines, oldest first.
    pub lines: Vec<OutputLine>,
    pub total_lines: usize,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session: TerminalSession,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct ListOutcome {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
    pub running: usize,
    pub completed: usize,
    pub error: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session: TerminalSession,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Live-process bookkeeping, present only while a session is running.
struct ActiveHandle {
    run: u64,
    kill_tx: mpsc::UnboundedSender<KillSignal>,
    timer: Option<AbortHandle>,
    done: Option<oneshot::Sender<()>>,
}

impl ActiveHandle {
    fn release(mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

#[derive(Default)]
struct ManagerState {
    sessions: HashMap<u32, TerminalSession>,
    active: HashMap<u32, ActiveHandle>,
    next_run: u64,
}

impl ManagerState {
    fn available(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.sessions.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    fn not_found(&self, pid: u32) -> TerminalError {
        TerminalError::NotFound {
            pid,
            available: self.available(),
        }
    }
}

struct Inner {
    state: Mutex<ManagerState>,
    shell: String,
    default_cwd: PathBuf,
}

/// Owns every terminal session for the lifetime of the process. Cheap to clone.
#[derive(Clone)]
pub struct TerminalManager {
    inner: Arc<Inner>,
}

enum Finish {
    Exited(std::io::Result<ExitStatus>),
    TimedOut(u64),
}

impl TerminalManager {
    pub fn new(shell: impl Into<String>, default_cwd: Option<PathBuf>) -> Self {
        let default_cwd = default_cwd.unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                warn!("Failed to get current directory: {}, using '.'", e);
                PathBuf::from(".")
            })
        });
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ManagerState::default()),
                shell: shell.into(),
                default_cwd,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a new session and return it immediately.
    ///
    /// Must be called from within a tokio runtime. Unless `background` is set, the
    /// process is terminated once `timeout_secs` (clamped to 1..=300) elapses.
    pub fn create(&self, opts: CreateOptions) -> Result<TerminalSession, TerminalError> {
        let shell = opts.shell.as_deref().unwrap_or(self.inner.shell.as_str());
        let cwd = opts
            .cwd
            .clone()
            .unwrap_or_else(|| self.inner.default_cwd.clone());
        let timeout_secs = opts.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        let mut guard = self.lock();
        let state = &mut *guard;

        let mut child = spawn(shell, &opts.command, &cwd)?;
        let Some(pid) = child.id() else {
            let _ = child.start_kill();
            warn!("terminal: spawned '{}' but no pid was assigned", opts.command);
            return Err(TerminalError::NoPid);
        };

        if state.active.contains_key(&pid) {
            let _ = child.start_kill();
            return Err(TerminalError::Spawn(format!(
                "pid {pid} is still bound to a running session"
            )));
        }
        if state.sessions.contains_key(&pid) {
            warn!("terminal: pid {} was reused by the OS, replacing finished session", pid);
        }

        let now = Utc::now();
        state.sessions.insert(
            pid,
            TerminalSession {
                pid,
                os_pid: Some(pid),
                command: opts.command.clone(),
                shell: shell.to_string(),
                cwd,
                status: SessionStatus::Running,
                created_at: now,
                last_updated: now,
                exit_code: None,
                error: None,
                output: Vec::new(),
                run: 0,
            },
        );

        let timeout = (!opts.background).then_some(timeout_secs);
        self.start_run(state, pid, child, timeout, None);
        info!(
            "terminal: created session {} ('{}', background={})",
            pid, opts.command, opts.background
        );

        state
            .sessions
            .get(&pid)
            .cloned()
            .ok_or_else(|| state.not_found(pid))
    }

    /// Run `command` in a finished session's working directory and wait for it.
    ///
    /// Rejected without side effects when the session is unknown or still running.
    pub async fn run(
        &self,
        pid: u32,
        command: &str,
        timeout_secs: u64,
    ) -> Result<RunOutcome, TerminalError> {
        let timeout_secs = timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        let done_rx = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let Some(session) = state.sessions.get_mut(&pid) else {
                return Err(state.not_found(pid));
            };
            if session.status == SessionStatus::Running || state.active.contains_key(&pid) {
                return Err(TerminalError::AlreadyRunning {
                    pid,
                    command: session.command.clone(),
                });
            }

            session.command = command.to_string();
            session.output.clear();
            session.exit_code = None;
            session.error = None;
            session.touch();

            match spawn(&session.shell, command, &session.cwd) {
                Ok(child) => {
                    session.status = SessionStatus::Running;
                    session.os_pid = child.id();
                    let (tx, rx) = oneshot::channel();
                    self.start_run(state, pid, child, Some(timeout_secs), Some(tx));
                    debug!("terminal: re-running session {} with '{}'", pid, command);
                    Some(rx)
                }
                Err(e) => {
                    warn!("terminal: run in session {} failed to spawn: {}", pid, e);
                    session.status = SessionStatus::Error;
                    session.error = Some(e.to_string());
                    session.os_pid = None;
                    None
                }
            }
        };

        if let Some(rx) = done_rx {
            let _ = rx.await;
        }

        let session = self.get(pid)?;
        Ok(RunOutcome {
            exit_code: session.exit_code,
            stdout: session.stream_text(OutputStream::Stdout),
            stderr: session.stream_text(OutputStream::Stderr),
            session,
        })
    }

    /// Session metadata plus its last `lines` output lines (clamped to 1..=15000).
    pub fn read(&self, pid: u32, lines: usize) -> Result<ReadOutcome, TerminalError> {
        let lines = lines.clamp(1, MAX_READ_LINES);
        let state = self.lock();
        let session = state.sessions.get(&pid).ok_or_else(|| state.not_found(pid))?;
        let total_lines = session.output.len();
        let start = total_lines.saturating_sub(lines);
        Ok(ReadOutcome {
            lines: session.output[start..].to_vec(),
            total_lines,
            is_active: state.active.contains_key(&pid),
            session: session.clone(),
        })
    }

    /// Sessions sorted by most recent update, with counts over every session.
    pub fn list(&self, include_completed: bool, limit: usize) -> ListOutcome {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let state = self.lock();

        let count = |status| {
            state
                .sessions
                .values()
                .filter(|s| s.status == status)
                .count()
        };
        let running = count(SessionStatus::Running);
        let completed = count(SessionStatus::Completed);
        let error = count(SessionStatus::Error);

        let mut selected: Vec<&TerminalSession> = state
            .sessions
            .values()
            .filter(|s| include_completed || s.status == SessionStatus::Running)
            .collect();
        selected.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| b.pid.cmp(&a.pid))
        });

        let sessions = selected
            .into_iter()
            .take(limit)
            .map(|s| SessionSummary {
                is_active: state.active.contains_key(&s.pid),
                session: s.clone(),
            })
            .collect();

        ListOutcome {
            sessions,
            total: state.sessions.len(),
            running,
            completed,
            error,
        }
    }

    /// Signal a live session and mark it as errored.
    pub fn kill(&self, pid: u32, signal: KillSignal) -> Result<TerminalSession, TerminalError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(session) = state.sessions.get_mut(&pid) else {
            return Err(state.not_found(pid));
        };
        let Some(handle) = state.active.remove(&pid) else {
            return Err(TerminalError::NotRunning {
                pid,
                status: session.status,
            });
        };

        if handle.kill_tx.send(signal).is_err() {
            warn!("terminal: session {} has no live waiter to signal", pid);
        }
        session.status = SessionStatus::Error;
        session.error = Some(format!("Process killed with {signal}"));
        session.touch();
        handle.release();
        info!("terminal: killed session {} with {}", pid, signal);
        Ok(session.clone())
    }

    /// Snapshot of one session.
    pub fn get(&self, pid: u32) -> Result<TerminalSession, TerminalError> {
        let state = self.lock();
        state
            .sessions
            .get(&pid)
            .cloned()
            .ok_or_else(|| state.not_found(pid))
    }

    pub fn is_active(&self, pid: u32) -> bool {
        self.lock().active.contains_key(&pid)
    }

    /// Pids of every known session, ascending.
    pub fn session_ids(&self) -> Vec<u32> {
        self.lock().available()
    }

    /// Wire up readers, the waiter and the optional timer for a freshly spawned child.
    /// Called with the state lock held.
    fn start_run(
        &self,
        state: &mut ManagerState,
        pid: u32,
        mut child: Child,
        timeout_secs: Option<u64>,
        done: Option<oneshot::Sender<()>>,
    ) {
        state.next_run += 1;
        let run = state.next_run;
        if let Some(session) = state.sessions.get_mut(&pid) {
            session.run = run;
        }

        let stdout = child
            .stdout
            .take()
            .map(|out| self.spawn_reader(pid, run, OutputStream::Stdout, out));
        let stderr = child
            .stderr
            .take()
            .map(|err| self.spawn_reader(pid, run, OutputStream::Stderr, err));

        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<KillSignal>();
        let manager = self.clone();
        tokio::spawn(async move {
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    Some(signal) = kill_rx.recv() => deliver_signal(&mut child, signal),
                }
            };
            let drain = async {
                for reader in [stdout, stderr].into_iter().flatten() {
                    let _ = reader.await;
                }
            };
            if tokio::time::timeout(READER_GRACE, drain).await.is_err() {
                debug!("terminal: output readers for session {} still open after exit", pid);
            }
            manager.finish(pid, run, Finish::Exited(status));
        });

        let timer = timeout_secs.map(|secs| {
            let manager = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                manager.finish(pid, run, Finish::TimedOut(secs));
            })
            .abort_handle()
        });

        state.active.insert(
            pid,
            ActiveHandle {
                run,
                kill_tx,
                timer,
                done,
            },
        );
    }

    fn spawn_reader<R>(
        &self,
        pid: u32,
        run: u64,
        stream: OutputStream,
        source: R,
    ) -> tokio::task::JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(source);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\n', '\r'])
                            .to_string();
                        manager.append(pid, run, stream, text);
                    }
                    Err(e) => {
                        debug!("terminal: {} read for session {} failed: {}", stream.as_str(), pid, e);
                        break;
                    }
                }
            }
        })
    }

    fn append(&self, pid: u32, run: u64, stream: OutputStream, text: String) {
        let mut state = self.lock();
        if let Some(session) = state.sessions.get_mut(&pid)
            && session.run == run
        {
            let timestamp = Utc::now();
            session.output.push(OutputLine {
                stream,
                timestamp,
                text,
            });
            session.last_updated = timestamp;
        }
    }

    /// Idempotent finaliser shared by exit and timeout. Only the first caller that
    /// still finds its own run in the active map has any effect.
    fn finish(&self, pid: u32, run: u64, how: Finish) {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.active.get(&pid) {
            Some(handle) if handle.run == run => {}
            _ => return,
        }
        let Some(handle) = state.active.remove(&pid) else {
            return;
        };
        let Some(session) = state.sessions.get_mut(&pid) else {
            handle.release();
            return;
        };

        match how {
            Finish::Exited(Ok(status)) => {
                session.exit_code = status.code();
                session.status = if status.success() {
                    SessionStatus::Completed
                } else {
                    SessionStatus::Error
                };
                if status.code().is_none() {
                    session.error = Some(format!("Process terminated: {status}"));
                }
                debug!("terminal: session {} exited ({})", pid, status);
            }
            Finish::Exited(Err(e)) => {
                session.status = SessionStatus::Error;
                session.error = Some(e.to_string());
                warn!("terminal: waiting on session {} failed: {}", pid, e);
            }
            Finish::TimedOut(secs) => {
                if handle.kill_tx.send(KillSignal::Term).is_err() {
                    warn!("terminal: session {} has no live waiter to signal", pid);
                }
                session.status = SessionStatus::Error;
                session.error = Some(format!("Process timed out after {secs} seconds"));
                info!("terminal: session {} timed out after {}s", pid, secs);
            }
        }
        session.touch();
        handle.release();
    }
}

impl fmt::Debug for TerminalManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalManager")
            .field("shell", &self.inner.shell)
            .field("default_cwd", &self.inner.default_cwd)
            .finish_non_exhaustive()
    }
}

fn spawn(shell: &str, command: &str, cwd: &Path) -> Result<Child, TerminalError> {
    shell_command(shell, command, cwd)
        .spawn()
        .map_err(|e| TerminalError::Spawn(e.to_string()))
}

#[cfg(unix)]
fn deliver_signal(child: &mut Child, signal: KillSignal) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        let _ = child.start_kill();
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions. The child leads its own
    // process group, so the negated pid targets the shell and its descendants.
    let rc = unsafe { libc::kill(-pgid, signal.raw()) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        warn!("terminal: {} to process group {} failed: {}", signal, pid, err);
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn deliver_signal(child: &mut Child, signal: KillSignal) {
    if let Err(e) = child.start_kill() {
        warn!("terminal: {} failed: {}", signal, e);
    }
}
