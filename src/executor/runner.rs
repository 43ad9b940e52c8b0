//! Async command execution with timeout support
//!
//! Runs make as a plain argument vector, never through a shell:
//! - Configurable timeout with process-group termination
//! - Concurrent stdout/stderr capture with a size cap
//! - Partial output preserved when a run times out
//! - Working directory control

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::TaskError;

/// Maximum output size before truncation (in bytes)
pub const MAX_OUTPUT_SIZE: usize = 100_000;

/// Default timeout for a make run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Truncation marker for large outputs
const TRUNCATION_MARKER: &str = "\n... [output truncated] ...\n";

/// Time between SIGTERM and SIGKILL on timeout
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Time allowed for readers to drain after the process exits
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

/// Options for async command execution
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Working directory for the command
    pub working_dir: Option<PathBuf>,
    /// Wall-clock limit for the run
    pub timeout: Duration,
    /// Maximum bytes captured per stream
    pub max_output_size: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
            max_output_size: MAX_OUTPUT_SIZE,
        }
    }
}

impl ExecOptions {
    /// Create options with a working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum output size
    pub fn with_max_output(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }
}

/// Outcome of one command run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Exit code; None when killed by a signal or by the timeout
    pub exit_code: Option<i32>,
    /// Standard output (may be truncated)
    pub stdout: String,
    /// Standard error (may be truncated)
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    /// Whether the run hit the timeout
    pub timed_out: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Display form of the argument vector
    pub command: String,
}

impl ExecutionResult {
    /// Exited on its own with status 0
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Build the make argument vector
///
/// Produces `<make_command…> -f <makefile> [-n] <target> <args…>`. `args` is
/// split with POSIX shell-word rules; nothing is expanded or interpreted.
///
/// # Errors
/// * `TaskError::InvalidArguments` - `args` or the make command has unbalanced quotes
pub fn build_make_argv(
    make_command: &str,
    makefile: &Path,
    target: &str,
    args: Option<&str>,
    dry_run: bool,
) -> Result<Vec<String>, TaskError> {
    let mut argv = shlex::split(make_command)
        .filter(|words| !words.is_empty())
        .ok_or_else(|| TaskError::InvalidArguments {
            message: format!("cannot parse make command '{}'", make_command),
        })?;

    argv.push("-f".to_string());
    argv.push(makefile.display().to_string());
    if dry_run {
        argv.push("-n".to_string());
    }
    argv.push(target.to_string());

    if let Some(args) = args.filter(|a| !a.trim().is_empty()) {
        let words = shlex::split(args).ok_or_else(|| TaskError::InvalidArguments {
            message: format!("unbalanced quotes in '{}'", args),
        })?;
        argv.extend(words);
    }

    Ok(argv)
}

/// Render an argument vector for logs and responses
pub fn display_command(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}

/// Execute an argument vector with timeout support
///
/// A non-zero exit is reported in the result, not as an error. On timeout the
/// whole process group is terminated and whatever output was captured so far
/// is returned with `timed_out = true`.
///
/// # Errors
/// * `TaskError::InvalidArguments` - `argv` is empty
/// * `TaskError::SpawnFailed` - The program could not be started
pub async fn exec_command(
    argv: &[String],
    options: &ExecOptions,
) -> Result<ExecutionResult, TaskError> {
    let (program, args) = argv.split_first().ok_or_else(|| TaskError::InvalidArguments {
        message: "empty command".to_string(),
    })?;

    let start = Instant::now();
    let command_str = display_command(argv);

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(ref dir) = options.working_dir {
        cmd.current_dir(dir);
    }

    tracing::debug!("Executing: {}", command_str);

    let mut child = cmd.spawn().map_err(|e| TaskError::SpawnFailed {
        command: command_str.clone(),
        error: e.to_string(),
    })?;

    let stdout_buf = Arc::new(Mutex::new(Capture::default()));
    let stderr_buf = Arc::new(Mutex::new(Capture::default()));
    let readers = [
        spawn_reader(child.stdout.take(), stdout_buf.clone(), options.max_output_size),
        spawn_reader(child.stderr.take(), stderr_buf.clone(), options.max_output_size),
    ];

    let (exit_code, timed_out) = match timeout(options.timeout, child.wait()).await {
        Ok(status) => (status?.code(), false),
        Err(_) => {
            tracing::warn!(
                "Command timed out after {}s: {}",
                options.timeout.as_secs_f64(),
                command_str
            );
            terminate_process_tree(&mut child).await;
            (None, true)
        }
    };

    drain_readers(readers).await;

    let (stdout, stdout_truncated) = lock(&stdout_buf).finish();
    let (stderr, stderr_truncated) = lock(&stderr_buf).finish();

    Ok(ExecutionResult {
        exit_code,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        duration_ms: start.elapsed().as_millis() as u64,
        command: command_str,
    })
}

/// Bytes captured from one stream
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Capture {
    fn push(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.bytes.extend_from_slice(&chunk[..room]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(chunk);
        }
    }

    fn finish(&self) -> (String, bool) {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        (text, self.truncated)
    }
}

fn lock(capture: &Mutex<Capture>) -> MutexGuard<'_, Capture> {
    capture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read a stream to EOF, keeping at most `limit` bytes
///
/// Reading continues past the limit so the child never blocks on a full pipe.
fn spawn_reader<R>(reader: Option<R>, sink: Arc<Mutex<Capture>>, limit: usize) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => lock(&sink).push(&buf[..n], limit),
                Err(e) => {
                    tracing::warn!("Error reading output: {}", e);
                    break;
                }
            }
        }
    })
}

/// Wait for readers to reach EOF; abort them if a straggler holds the pipe
async fn drain_readers(readers: [JoinHandle<()>; 2]) {
    let aborts: Vec<_> = readers.iter().map(|h| h.abort_handle()).collect();
    let joined = timeout(DRAIN_GRACE, async move {
        for handle in readers {
            let _ = handle.await;
        }
    })
    .await;

    if joined.is_err() {
        tracing::debug!("Output readers did not finish, aborting");
        for abort in aborts {
            abort.abort();
        }
    }
}

/// Stop the child and everything it spawned
#[cfg(unix)]
async fn terminate_process_tree(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let group = Pid::from_raw(pid as i32);
        let _ = killpg(group, Signal::SIGTERM);
        if timeout(KILL_GRACE, child.wait()).await.is_err() {
            tracing::debug!("Process group {} ignored SIGTERM", pid);
        }
        let _ = killpg(group, Signal::SIGKILL);
    }

    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[cfg(not(unix))]
async fn terminate_process_tree(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}
