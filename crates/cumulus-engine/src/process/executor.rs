//! External tool execution as child processes with timeout management,
//! streamed progress extraction, and bounded diagnostic capture.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;

use crate::process::progress::ProgressParser;

/// One external tool invocation.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// The executable name or absolute path.
    pub command: String,
    /// Fully substituted arguments.
    pub args: Vec<String>,
    /// Hard wall-clock timeout. There is no "wait forever".
    pub timeout: Duration,
    /// Progress marker parser for the tool's output streams.
    pub parser: ProgressParser,
}

/// Executor for running external media tools.
///
/// Guarantees no process outlives a failed or timed-out job: the child
/// is spawned as its own process-group leader with `kill_on_drop`, and
/// on timeout the whole group is killed and reaped. Tools that fork
/// (shells, office converters) cannot leave grandchildren behind.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Cap on captured diagnostic output, in bytes.
    diagnostic_cap: usize,
}

impl ProcessExecutor {
    /// Create an executor with the default diagnostic capture cap.
    pub fn new() -> Self {
        Self {
            diagnostic_cap: 4 * 1024,
        }
    }

    /// Run a tool to completion, streaming extracted progress
    /// percentages (0-99) into `progress`.
    pub async fn run(&self, spec: &ProcessSpec, progress: mpsc::Sender<u8>) -> AppResult<()> {
        tracing::info!(
            command = %spec.command,
            args = ?spec.args,
            timeout_seconds = spec.timeout.as_secs(),
            "Executing tool"
        );

        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            AppError::with_source(
                cumulus_core::error::ErrorKind::ProcessFailure,
                format!("Failed to spawn '{}': {e}", spec.command),
                e,
            )
        })?;
        let pid = child.id();

        let tail = Arc::new(Mutex::new(TailBuffer::new(self.diagnostic_cap)));

        let stdout_reader = child
            .stdout
            .take()
            .map(|out| spawn_reader(out, spec.parser, progress.clone(), Arc::clone(&tail)));
        let stderr_reader = child
            .stderr
            .take()
            .map(|err| spawn_reader(err, spec.parser, progress.clone(), Arc::clone(&tail)));

        let status = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(AppError::with_source(
                    cumulus_core::error::ErrorKind::ProcessFailure,
                    format!("Failed waiting for '{}': {e}", spec.command),
                    e,
                ));
            }
            Err(_) => {
                // Kill the whole group and reap so no orphan outlives
                // the job, then drop the readers: the pipes may be held
                // open until the group is fully gone.
                kill_process_group(pid);
                let _ = child.start_kill();
                let _ = child.wait().await;
                if let Some(handle) = stdout_reader {
                    handle.abort();
                }
                if let Some(handle) = stderr_reader {
                    handle.abort();
                }
                tracing::error!(
                    command = %spec.command,
                    timeout_seconds = spec.timeout.as_secs(),
                    "Tool timed out and was killed"
                );
                return Err(AppError::timeout(format!(
                    "Process '{}' exceeded its {}s timeout",
                    spec.command,
                    spec.timeout.as_secs()
                )));
            }
        };

        // Drain the readers so the diagnostic tail is complete.
        if let Some(handle) = stdout_reader {
            let _ = handle.await;
        }
        if let Some(handle) = stderr_reader {
            let _ = handle.await;
        }

        if status.success() {
            Ok(())
        } else {
            let code = status.code().unwrap_or(-1);
            let diagnostics = tail.lock().map(|t| t.to_text()).unwrap_or_default();
            tracing::error!(
                command = %spec.command,
                exit_code = code,
                diagnostics = %diagnostics,
                "Tool exited non-zero"
            );
            Err(AppError::process_failure(format!(
                "Process '{}' exited with code {code}: {diagnostics}",
                spec.command
            )))
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Kill every process in the child's group. The child was spawned as
/// its own group leader, so forked grandchildren die with it.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // Safety: killpg on a group we created; a stale pid at worst
        // returns ESRCH.
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Stream one output pipe: feed progress markers into the channel and
/// keep a bounded tail of lines for diagnostics.
fn spawn_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    parser: ProgressParser,
    progress: mpsc::Sender<u8>,
    tail: Arc<Mutex<TailBuffer>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(percent) = parser.parse_line(&line) {
                // The receiver may already be gone on cancellation.
                let _ = progress.send(percent).await;
            }
            if let Ok(mut tail) = tail.lock() {
                tail.push(line);
            }
        }
    })
}

/// Bounded buffer of the most recent output lines.
#[derive(Debug)]
struct TailBuffer {
    lines: std::collections::VecDeque<String>,
    bytes: usize,
    cap: usize,
}

impl TailBuffer {
    fn new(cap: usize) -> Self {
        Self {
            lines: std::collections::VecDeque::new(),
            bytes: 0,
            cap,
        }
    }

    fn push(&mut self, line: String) {
        self.bytes += line.len();
        self.lines.push_back(line);
        while self.bytes > self.cap {
            match self.lines.pop_front() {
                Some(dropped) => self.bytes -= dropped.len(),
                None => break,
            }
        }
    }

    fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
