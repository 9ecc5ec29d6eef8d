//! Bounded shell command execution.
//!
//! Used by `command` rule checks. Commands run with captured output and a
//! hard deadline; a command that outlives it is killed. Output still held
//! open past the deadline (a backgrounded grandchild) is abandoned.

use std::io::Read;
use std::path::Path;
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a finished command.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the command
    pub status: ExitStatus,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Time taken to execute
    pub duration: Duration,
}

impl ExecutionResult {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Why a command could not produce a result.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Process could not be started or waited on.
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Process outlived its deadline and was killed.
    #[error("'{command}' timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
}

/// Runs shell commands with a deadline.
#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
}

impl Executor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `command` through the platform shell in `working_dir`.
    pub fn run(&self, command: &str, working_dir: &Path) -> Result<ExecutionResult, ExecError> {
        let start = Instant::now();
        let spawn_err = |source| ExecError::Spawn { command: command.to_string(), source };

        let (shell, shell_arg) = get_shell();
        let mut child = ProcessCommand::new(shell)
            .arg(shell_arg)
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // Drain pipes on threads so a chatty child cannot block on a full pipe.
        let (tx, rx) = mpsc::channel();
        let stdout = child.stdout.take();
        let stdout_tx = tx.clone();
        std::thread::spawn(move || stdout_tx.send((Pipe::Stdout, read_all(stdout))));
        let stderr = child.stderr.take();
        std::thread::spawn(move || tx.send((Pipe::Stderr, read_all(stderr))));

        let timed_out = || {
            tracing::warn!(command, timeout_secs = self.timeout.as_secs(), "Command timed out");
            ExecError::Timeout { command: command.to_string(), timeout: self.timeout }
        };

        let status = loop {
            if let Some(status) = child.try_wait().map_err(spawn_err)? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(timed_out());
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        // The shell is gone, but anything it backgrounded may still hold the
        // pipes open; wait for them only until the deadline.
        let (mut stdout, mut stderr) = (None, None);
        while stdout.is_none() || stderr.is_none() {
            let remaining = self.timeout.saturating_sub(start.elapsed());
            match rx.recv_timeout(remaining) {
                Ok((Pipe::Stdout, text)) => stdout = Some(text),
                Ok((Pipe::Stderr, text)) => stderr = Some(text),
                Err(RecvTimeoutError::Timeout) => return Err(timed_out()),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        let (stdout, stderr) = (stdout.unwrap_or_default(), stderr.unwrap_or_default());
        let duration = start.elapsed();
        tracing::debug!(command, code = ?status.code(), ?duration, "Command finished");

        Ok(ExecutionResult { status, stdout, stderr, duration })
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn read_all<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Get the shell and argument for the current platform.
fn get_shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}
