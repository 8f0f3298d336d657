//! External process execution with timeouts and cooperative cancellation
//!
//! Every git invocation in the crate goes through [`CommandRunner`]. The real
//! implementation, [`ProcessRunner`], spawns the configured binary with an
//! argument vector (never a shell), drains stdout and stderr concurrently, and
//! kills the child when the timeout elapses or the cancellation token fires.

use crate::error::ProcessError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default timeout for metadata commands (rev-parse, rev-list, status)
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for bulk-export commands (log --all)
pub const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which timeout class a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Quick lookups against repository metadata
    Metadata,
    /// Commands that dump large amounts of history
    Export,
}

/// Why a command did not produce a normal exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFailure {
    MissingDirectory,
    TimedOut,
    Cancelled,
    SpawnFailed,
}

/// Captured result of one process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// True only when the process exited with status 0
    pub success: bool,
    /// Trimmed standard output
    pub stdout: String,
    /// Trimmed standard error (or a description of the failure)
    pub stderr: String,
    /// Exit code, absent when the process was killed or never started
    pub exit_code: Option<i32>,
    /// Set when the process did not run to completion
    pub failure: Option<ProcessFailure>,
}

impl ProcessOutput {
    /// Successful exit with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            failure: None,
        }
    }

    /// Process ran to completion with a non-zero status
    pub fn exited(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: code == 0,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            failure: None,
        }
    }

    /// Process did not run to completion
    pub fn failed(failure: ProcessFailure, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: None,
            failure: Some(failure),
        }
    }
}

/// Seam over process execution so callers can be tested without spawning git
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command in `working_dir`
    ///
    /// Returns `Err` only for caller mistakes (empty directory or arguments).
    /// Every runtime failure is reported through [`ProcessOutput`].
    async fn run(
        &self,
        working_dir: &Path,
        args: &[&str],
        kind: CommandKind,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Runs an external binary with a hard timeout per command class
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: PathBuf,
    metadata_timeout: Duration,
    export_timeout: Duration,
}

enum Completion {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ProcessRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }

    /// Override the metadata timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Override the bulk-export timeout
    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn timeout_for(&self, kind: CommandKind) -> Duration {
        match kind {
            CommandKind::Metadata => self.metadata_timeout,
            CommandKind::Export => self.export_timeout,
        }
    }

    /// Run a command with an explicit timeout
    pub async fn run_with_timeout(
        &self,
        working_dir: &Path,
        args: &[&str],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        validate_arguments(working_dir, args)?;

        if !working_dir.is_dir() {
            tracing::debug!("Working directory does not exist: {}", working_dir.display());
            return Ok(ProcessOutput::failed(
                ProcessFailure::MissingDirectory,
                format!("Working directory does not exist: {}", working_dir.display()),
            ));
        }

        if cancel.is_cancelled() {
            return Ok(ProcessOutput::failed(
                ProcessFailure::Cancelled,
                "Cancelled before start",
            ));
        }

        tracing::trace!(
            "Running {} {} in {}",
            self.binary.display(),
            args.join(" "),
            working_dir.display()
        );

        let mut child = match Command::new(&self.binary)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!("Failed to spawn {}: {}", self.binary.display(), e);
                return Ok(ProcessOutput::failed(
                    ProcessFailure::SpawnFailed,
                    format!("Failed to start {}: {}", self.binary.display(), e),
                ));
            }
        };

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe
        let stdout_task = child.stdout.take().map(|out| tokio::spawn(collect_lines(out)));
        let stderr_task = child.stderr.take().map(|err| tokio::spawn(collect_lines(err)));

        let completion = tokio::select! {
            status = child.wait() => Completion::Exited(status),
            _ = tokio::time::sleep(timeout) => Completion::TimedOut,
            _ = cancel.cancelled() => Completion::Cancelled,
        };

        if !matches!(completion, Completion::Exited(_)) {
            if let Err(e) = child.kill().await {
                tracing::debug!("Failed to kill {}: {}", self.binary.display(), e);
            }
            // Grandchildren may still hold the pipes open
            for task in [&stdout_task, &stderr_task].into_iter().flatten() {
                task.abort();
            }
        }

        let stdout = join_output(stdout_task).await;
        let stderr = join_output(stderr_task).await;

        let output = match completion {
            Completion::Exited(Ok(status)) => ProcessOutput {
                success: status.success(),
                stdout,
                stderr,
                exit_code: status.code(),
                failure: None,
            },
            Completion::Exited(Err(e)) => ProcessOutput {
                success: false,
                stdout,
                stderr: format!("Failed to wait for process: {}", e),
                exit_code: None,
                failure: None,
            },
            Completion::TimedOut => {
                tracing::warn!(
                    "{} {} timed out after {:?} in {}",
                    self.binary.display(),
                    args.join(" "),
                    timeout,
                    working_dir.display()
                );
                ProcessOutput::failed(
                    ProcessFailure::TimedOut,
                    format!("Timed out after {:?}", timeout),
                )
            }
            Completion::Cancelled => {
                tracing::debug!("{} {} cancelled", self.binary.display(), args.join(" "));
                ProcessOutput::failed(ProcessFailure::Cancelled, "Cancelled")
            }
        };

        Ok(output)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        working_dir: &Path,
        args: &[&str],
        kind: CommandKind,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        self.run_with_timeout(working_dir, args, self.timeout_for(kind), cancel)
            .await
    }
}

fn validate_arguments(working_dir: &Path, args: &[&str]) -> Result<(), ProcessError> {
    if working_dir.as_os_str().is_empty() {
        return Err(ProcessError::InvalidArgument {
            name: "working_dir".to_string(),
            reason: "must not be empty".to_string(),
        });
    }

    match args.first() {
        None => Err(ProcessError::InvalidArgument {
            name: "args".to_string(),
            reason: "must contain at least one argument".to_string(),
        }),
        Some(first) if first.trim().is_empty() => Err(ProcessError::InvalidArgument {
            name: "args".to_string(),
            reason: "first argument must not be blank".to_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// Read a pipe to the end, line by line, decoding lossily
async fn collect_lines<R>(pipe: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                lines.push(line.trim_end_matches(['\r', '\n']).to_string());
            }
            Err(e) => {
                tracing::trace!("Stopped reading process output: {}", e);
                break;
            }
        }
    }

    lines.join("\n").trim().to_string()
}

async fn join_output(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shell() -> ProcessRunner {
        ProcessRunner::new("sh")
    }

    #[tokio::test]
    async fn test_empty_working_dir_is_invalid() {
        let runner = shell();
        let err = runner
            .run(Path::new(""), &["-c", "true"], CommandKind::Metadata, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArgument { ref name, .. } if name == "working_dir"));
    }

    #[tokio::test]
    async fn test_empty_args_are_invalid() {
        let dir = TempDir::new().unwrap();
        let runner = shell();
        let cancel = CancellationToken::new();

        let err = runner
            .run(dir.path(), &[], CommandKind::Metadata, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArgument { ref name, .. } if name == "args"));

        let err = runner
            .run(dir.path(), &["  "], CommandKind::Metadata, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_failure_result() {
        let output = shell()
            .run(
                Path::new("/nonexistent/dir/12345"),
                &["-c", "true"],
                CommandKind::Metadata,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.failure, Some(ProcessFailure::MissingDirectory));
        assert_eq!(output.exit_code, None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let output = ProcessRunner::new("definitely-not-a-real-binary-12345")
            .run(dir.path(), &["status"], CommandKind::Metadata, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.failure, Some(ProcessFailure::SpawnFailed));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_trimmed_stdout() {
        let dir = TempDir::new().unwrap();
        let output = shell()
            .run(
                dir.path(),
                &["-c", "printf '  hello\\nworld  \\n\\n'"],
                CommandKind::Metadata,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout, "hello\nworld");
        assert!(output.failure.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let output = shell()
            .run(dir.path(), &["-c", "ls"], CommandKind::Metadata, &CancellationToken::new())
            .await
            .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_code_and_stderr() {
        let dir = TempDir::new().unwrap();
        let output = shell()
            .run(
                dir.path(),
                &["-c", "echo boom >&2; exit 3"],
                CommandKind::Metadata,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr, "boom");
        assert!(output.failure.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lossy_utf8_decoding() {
        let dir = TempDir::new().unwrap();
        let output = shell()
            .run(
                dir.path(),
                &["-c", "printf 'ok\\377done'"],
                CommandKind::Metadata,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.success);
        assert!(output.stdout.starts_with("ok"));
        assert!(output.stdout.ends_with("done"));
        assert!(output.stdout.contains('\u{FFFD}'));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_on_both_pipes_does_not_deadlock() {
        let dir = TempDir::new().unwrap();
        let script = "i=0; while [ $i -lt 20000 ]; do echo out$i; echo err$i >&2; i=$((i+1)); done";
        let output = shell()
            .with_timeout(Duration::from_secs(20))
            .run(dir.path(), &["-c", script], CommandKind::Metadata, &CancellationToken::new())
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.lines().count(), 20000);
        assert_eq!(output.stderr.lines().count(), 20000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let started = std::time::Instant::now();
        let output = shell()
            .with_timeout(Duration::from_millis(200))
            .run(dir.path(), &["-c", "exec sleep 10"], CommandKind::Metadata, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.failure, Some(ProcessFailure::TimedOut));
        assert_eq!(output.exit_code, None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_export_kind_uses_export_timeout() {
        let dir = TempDir::new().unwrap();
        let runner = shell()
            .with_timeout(Duration::from_secs(30))
            .with_export_timeout(Duration::from_millis(200));
        let output = runner
            .run(dir.path(), &["-c", "exec sleep 10"], CommandKind::Export, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.failure, Some(ProcessFailure::TimedOut));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        let started = std::time::Instant::now();
        let output = shell()
            .run(dir.path(), &["-c", "exec sleep 10"], CommandKind::Metadata, &cancel)
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.failure, Some(ProcessFailure::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_spawn() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let output = ProcessRunner::new("definitely-not-a-real-binary-12345")
            .run(dir.path(), &["status"], CommandKind::Metadata, &cancel)
            .await
            .unwrap();
        assert_eq!(output.failure, Some(ProcessFailure::Cancelled));
    }

    #[test]
    fn test_default_timeouts() {
        let runner = ProcessRunner::default();
        assert_eq!(runner.binary(), Path::new("git"));
        assert_eq!(runner.timeout_for(CommandKind::Metadata), Duration::from_secs(30));
        assert_eq!(runner.timeout_for(CommandKind::Export), Duration::from_secs(60));
    }

    #[test]
    fn test_output_constructors() {
        let ok = ProcessOutput::ok("true");
        assert!(ok.success);
        assert_eq!(ok.exit_code, Some(0));

        let exited = ProcessOutput::exited(128, "fatal: not a git repository");
        assert!(!exited.success);
        assert_eq!(exited.exit_code, Some(128));

        let failed = ProcessOutput::failed(ProcessFailure::TimedOut, "slow");
        assert!(!failed.success);
        assert_eq!(failed.exit_code, None);
    }
}
