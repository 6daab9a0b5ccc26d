//! Shell Executor
//!
//! Runs a final command line through the host shell (`sh -c` / `cmd /C`),
//! waits for it under a timeout, and turns whatever happened into an
//! [`ExecutionResult`]. Failures are captured in the result, never returned
//! as errors, so every attempt can be audited.

use super::decode::OutputDecoder;
use super::platform::Platform;
use super::timeout::{Deadline, ExecutionTimeout};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default timeout for command execution in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum output size in bytes (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Why an execution did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The shell could not be started
    Spawn,

    /// The command ran and exited with a non-zero status
    NonZeroExit,

    /// The command exceeded its wall-clock budget and was killed
    Timeout,

    /// The caller cancelled the command and it was killed
    Cancelled,
}

/// Result of one command execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Decoded, trimmed standard output (truncated if too large)
    pub stdout: String,

    /// Decoded, trimmed standard error (truncated if too large)
    pub stderr: String,

    /// Whether the process exited with status 0
    pub exit_succeeded: bool,

    /// Diagnostic text when the execution failed
    pub error_message: Option<String>,

    /// Exit code (None if the process never ran or was killed)
    pub exit_code: Option<i32>,

    /// Execution duration in milliseconds
    pub duration_ms: f64,

    pub failure: Option<FailureKind>,
}

impl ExecutionResult {
    fn success(stdout: String, stderr: String, duration_ms: f64) -> Self {
        Self {
            stdout,
            stderr,
            exit_succeeded: true,
            error_message: None,
            exit_code: Some(0),
            duration_ms,
            failure: None,
        }
    }

    fn nonzero_exit(stdout: String, stderr: String, exit_code: Option<i32>, duration_ms: f64) -> Self {
        let status = match exit_code {
            Some(code) => format!("exit code {}", code),
            None => "termination by signal".to_string(),
        };
        let error_message = if stderr.is_empty() {
            format!("Command failed with {}", status)
        } else {
            format!("Command failed with {}: {}", status, stderr)
        };
        Self {
            stdout,
            stderr,
            exit_succeeded: false,
            error_message: Some(error_message),
            exit_code,
            duration_ms,
            failure: Some(FailureKind::NonZeroExit),
        }
    }

    fn aborted(kind: FailureKind, message: String, duration_ms: f64) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_succeeded: false,
            error_message: Some(message),
            exit_code: None,
            duration_ms,
            failure: Some(kind),
        }
    }

    pub fn timed_out(&self) -> bool {
        self.failure == Some(FailureKind::Timeout)
    }

    /// Short label for metrics and logs
    pub fn status_label(&self) -> &'static str {
        match self.failure {
            None => "success",
            Some(FailureKind::Spawn) => "spawn_error",
            Some(FailureKind::NonZeroExit) => "failed",
            Some(FailureKind::Timeout) => "timeout",
            Some(FailureKind::Cancelled) => "cancelled",
        }
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self.failure {
            None => format!(
                "Success ({:.0}ms, {} bytes output)",
                self.duration_ms,
                self.stdout.len()
            ),
            Some(FailureKind::Timeout) => format!("Timeout after {:.0}ms", self.duration_ms),
            Some(FailureKind::Cancelled) => format!("Cancelled after {:.0}ms", self.duration_ms),
            Some(FailureKind::Spawn) => format!(
                "Spawn failed: {}",
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
            Some(FailureKind::NonZeroExit) => format!(
                "Failed (exit code: {:?}, {:.0}ms, {} bytes output)",
                self.exit_code,
                self.duration_ms,
                self.stdout.len() + self.stderr.len()
            ),
        }
    }
}

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Timeout for execution (default: 60 seconds)
    pub timeout: Duration,

    /// Maximum decoded output size in bytes, per stream (default: 1MB)
    pub max_output_size: usize,

    /// Working directory for command execution (default: current directory)
    pub working_dir: Option<PathBuf>,

    /// Platform whose shell runs the command
    pub platform: Platform,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_size: MAX_OUTPUT_SIZE,
            working_dir: None,
            platform: Platform::current(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            ..Default::default()
        }
    }

    pub fn with_max_output_size(size: usize) -> Self {
        Self {
            max_output_size: size,
            ..Default::default()
        }
    }

    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }
}

/// Runs final command lines through the platform shell
///
/// # Example
///
/// ```no_run
/// use smartcode::tools::ShellExecutor;
///
/// #[tokio::main]
/// async fn main() {
///     let executor = ShellExecutor::new();
///     let result = executor.execute("echo hello world").await;
///     assert!(result.exit_succeeded);
///     assert_eq!(result.stdout, "hello world");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    config: ExecutorConfig,
    decoder: OutputDecoder,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Executor with the default code page for the configured platform
    pub fn with_config(config: ExecutorConfig) -> Self {
        let decoder = OutputDecoder::new(config.platform);
        Self { config, decoder }
    }

    /// Executor with an explicit decoder; the decoder's platform wins
    pub fn with_decoder(mut config: ExecutorConfig, decoder: OutputDecoder) -> Self {
        config.platform = decoder.platform();
        Self { config, decoder }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn decoder(&self) -> &OutputDecoder {
        &self.decoder
    }

    /// Run a command line to completion or timeout
    pub async fn execute(&self, command: &str) -> ExecutionResult {
        self.run(command, None).await
    }

    /// Run a command line, killing it early if `cancel` fires
    pub async fn execute_with_cancel(
        &self,
        command: &str,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        self.run(command, Some(cancel)).await
    }

    async fn run(&self, command: &str, cancel: Option<&CancellationToken>) -> ExecutionResult {
        let start = Instant::now();
        let (shell, flag) = self.config.platform.shell();
        info!(shell, "Executing: {}", command);

        let mut process = TokioCommand::new(shell);
        process.arg(flag);
        append_command_line(&mut process, command);

        if let Some(ref dir) = self.config.working_dir {
            process.current_dir(dir);
        }

        // own process group, so the whole tree can be killed on timeout
        #[cfg(unix)]
        process.process_group(0);

        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", shell, e);
                return ExecutionResult::aborted(
                    FailureKind::Spawn,
                    format!("Failed to spawn process '{}': {}", shell, e),
                    elapsed_ms(start),
                );
            }
        };

        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        // one byte past the cap so truncation is still detected after decoding
        let read_limit = self.config.max_output_size.saturating_add(1) as u64;

        let timeout = ExecutionTimeout::new(self.config.timeout);
        let collected = timeout
            .race(
                async {
                    let (status, out, err) = tokio::join!(
                        child.wait(),
                        read_capped(stdout, read_limit),
                        read_capped(stderr, read_limit),
                    );
                    Ok::<_, std::io::Error>((status?, out?, err?))
                },
                cancel,
            )
            .await;

        let (status, out, err) = match collected {
            Deadline::Completed(Ok(collected)) => collected,
            Deadline::Completed(Err(e)) => {
                warn!("Failed to collect output: {}", e);
                kill_process_tree(&mut child, pid).await;
                return ExecutionResult::aborted(
                    FailureKind::Spawn,
                    format!("Failed to collect process output: {}", e),
                    elapsed_ms(start),
                );
            }
            Deadline::TimedOut => {
                warn!("Command timed out after {:?}", self.config.timeout);
                kill_process_tree(&mut child, pid).await;
                return ExecutionResult::aborted(
                    FailureKind::Timeout,
                    format!("Command timed out after {:?}", self.config.timeout),
                    elapsed_ms(start),
                );
            }
            Deadline::Cancelled => {
                warn!("Command cancelled: {}", command);
                kill_process_tree(&mut child, pid).await;
                return ExecutionResult::aborted(
                    FailureKind::Cancelled,
                    "Command cancelled".to_string(),
                    elapsed_ms(start),
                );
            }
        };

        let duration_ms = elapsed_ms(start);
        let stdout = truncate_string(self.decoder.decode(&out), self.config.max_output_size);
        let stderr = truncate_string(self.decoder.decode(&err), self.config.max_output_size);

        if status.success() {
            debug!("Command succeeded in {:.0}ms", duration_ms);
            ExecutionResult::success(stdout, stderr, duration_ms)
        } else {
            let exit_code = status.code();
            warn!("Command failed: {} (exit code: {:?})", command, exit_code);
            ExecutionResult::nonzero_exit(stdout, stderr, exit_code, duration_ms)
        }
    }
}

/// Read at most `limit` bytes of a pipe, then drain the rest so the writer never blocks
async fn read_capped<R>(pipe: Option<R>, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let Some(pipe) = pipe else {
        return Ok(buf);
    };
    let mut head = pipe.take(limit);
    head.read_to_end(&mut buf).await?;
    let mut rest = head.into_inner();
    tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    Ok(buf)
}

/// Kill the shell and everything it started, then reap it
///
/// `pid` is captured at spawn; the shell may already be reaped while
/// background children still hold its pipes.
#[cfg(unix)]
async fn kill_process_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        // the child leads its own group (process_group(0)), so pgid == pid
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            debug!(
                "killpg({}) failed: {}",
                pid,
                std::io::Error::last_os_error()
            );
        }
    }
    if let Err(e) = child.kill().await {
        debug!("Failed to kill shell process: {}", e);
    }
}

#[cfg(windows)]
async fn kill_process_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        let status = TokioCommand::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = status {
            debug!("taskkill for {} failed: {}", pid, e);
        }
    }
    if let Err(e) = child.kill().await {
        debug!("Failed to kill shell process: {}", e);
    }
}

/// cmd.exe does its own parsing of the line after `/C`, so it is passed verbatim
#[cfg(windows)]
fn append_command_line(process: &mut TokioCommand, command: &str) {
    process.raw_arg(command);
}

#[cfg(not(windows))]
fn append_command_line(process: &mut TokioCommand, command: &str) {
    process.arg(command);
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

const ELLIPSIS: &str = "...";

/// Truncate a string to at most `max_len` bytes on a char boundary, adding an ellipsis if truncated
///
/// Caps too small to hold the ellipsis get a plain cut.
fn truncate_string(mut s: String, max_len: usize) -> String {
    if s.len() <= max_len {
        return s;
    }
    let suffix = if max_len > ELLIPSIS.len() { ELLIPSIS } else { "" };
    let mut cut = max_len - suffix.len();
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s.push_str(suffix);
    s
}
