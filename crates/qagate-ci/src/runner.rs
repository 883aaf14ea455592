//! Child process execution with timeout, cancellation and bounded capture.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::cancel::CancelSignal;

/// Upper bound on how much of a stream is kept for parsing.
pub const MAX_PARSE_BYTES: usize = 16 * 1024 * 1024;

/// How long to wait for pipes to drain after the child is gone. Grandchildren
/// that escaped the process group can otherwise hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(5);
const KILLED_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// A fully rendered command line.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
    /// Bytes kept per stream; at least this much of each tail survives.
    pub capture_bytes: usize,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
            timeout: Duration::from_secs(qagate_core::config::DEFAULT_TIMEOUT_SECS),
            capture_bytes: qagate_core::config::DEFAULT_CAPTURE_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_capture_bytes(mut self, bytes: usize) -> Self {
        self.capture_bytes = bytes;
        self
    }
}

/// How the child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited { code: i32 },
    Signaled { signal: Option<i32> },
    TimedOut,
    Cancelled,
    SpawnFailed(String),
}

/// Outcome plus captured streams.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub outcome: ProcessOutcome,
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream exceeded the parse bound.
    pub truncated: bool,
    pub duration_ms: u64,
}

impl ProcessOutput {
    fn spawn_failed(message: String, start: Instant) -> Self {
        Self {
            outcome: ProcessOutcome::SpawnFailed(message),
            stdout: String::new(),
            stderr: String::new(),
            truncated: false,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            ProcessOutcome::Exited { code } => Some(code),
            _ => None,
        }
    }
}

/// Run a process to completion, timeout or cancellation.
///
/// The child runs in its own process group. The whole group is killed when
/// the timeout elapses or `cancel` fires; dropping this future kills only the
/// direct child.
pub async fn run_process(spec: &ProcessSpec, cancel: &CancelSignal) -> ProcessOutput {
    let start = Instant::now();
    let mut cancel = cancel.clone();
    if cancel.is_cancelled() {
        return ProcessOutput {
            outcome: ProcessOutcome::Cancelled,
            stdout: String::new(),
            stderr: String::new(),
            truncated: false,
            duration_ms: 0,
        };
    }

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    let spawned = command.spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return ProcessOutput::spawn_failed(format!("{}: {e}", spec.program), start),
    };

    let limit = spec.capture_bytes.max(MAX_PARSE_BYTES);
    let stdout_task = child.stdout.take().map(|s| spawn_reader(s, limit));
    let stderr_task = child.stderr.take().map(|s| spawn_reader(s, limit));

    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => exit_outcome(status),
            Err(e) => ProcessOutcome::SpawnFailed(format!("wait failed: {e}")),
        },
        _ = tokio::time::sleep(spec.timeout) => ProcessOutcome::TimedOut,
        _ = cancel.cancelled() => ProcessOutcome::Cancelled,
    };

    let grace = match outcome {
        ProcessOutcome::TimedOut | ProcessOutcome::Cancelled => {
            kill_tree(&mut child, &spec.program).await;
            KILLED_DRAIN_GRACE
        }
        _ => DRAIN_GRACE,
    };

    let (stdout, out_truncated) = drain(stdout_task, grace).await;
    let (stderr, err_truncated) = drain(stderr_task, grace).await;

    ProcessOutput {
        outcome,
        stdout,
        stderr,
        truncated: out_truncated || err_truncated,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Kill the child's process group, then the child itself.
async fn kill_tree(child: &mut Child, program: &str) {
    if let Some(pid) = child.id() {
        kill_group(pid, program);
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(program = %program, error = %e, "failed to kill child");
    }
}

#[cfg(unix)]
fn kill_group(pid: u32, program: &str) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        tracing::debug!(program = %program, error = %e, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_: u32, _: &str) {}

fn exit_outcome(status: std::process::ExitStatus) -> ProcessOutcome {
    match status.code() {
        Some(code) => ProcessOutcome::Exited { code },
        None => ProcessOutcome::Signaled {
            signal: signal_of(&status),
        },
    }
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_: &std::process::ExitStatus) -> Option<i32> {
    None
}

type Reader = JoinHandle<(Vec<u8>, bool)>;

fn spawn_reader<R>(stream: R, limit: usize) -> Reader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_bounded(stream, limit))
}

/// Read a stream to EOF keeping only the last `limit` bytes.
async fn read_bounded<R>(mut stream: R, limit: usize) -> (Vec<u8>, bool)
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > limit.saturating_mul(2) {
                    let excess = buf.len() - limit;
                    buf.drain(..excess);
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }
    if buf.len() > limit {
        let excess = buf.len() - limit;
        buf.drain(..excess);
        truncated = true;
    }
    (buf, truncated)
}

async fn drain(task: Option<Reader>, grace: Duration) -> (String, bool) {
    let Some(mut task) = task else {
        return (String::new(), false);
    };
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok((bytes, truncated))) => (String::from_utf8_lossy(&bytes).into_owned(), truncated),
        Ok(Err(_)) => (String::new(), false),
        Err(_) => {
            task.abort();
            (String::new(), true)
        }
    }
}

/// Last `max_bytes` of `text`, cut on a char boundary.
pub fn tail(text: &str, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text.to_string(), false);
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    (text[start..].to_string(), true)
}
