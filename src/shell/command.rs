//! Process execution with streamed output and deadline enforcement.

use crate::error::{GantryError, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How often the parent checks a running child against the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of executing a process.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal or by the deadline).
    pub exit_code: Option<i32>,

    /// Whether the process was forcibly terminated at the deadline.
    pub timed_out: bool,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the process succeeded (exit code 0, no timeout).
    pub success: bool,
}

/// Options for process execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with the inherited environment).
    pub env: HashMap<String, String>,
}

/// Output line from process execution.
#[derive(Debug, Clone)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Callback for streaming output.
pub type OutputCallback = Box<dyn Fn(OutputLine) + Send>;

/// Spawn a process, stream its output line by line, and wait for it to
/// finish or for the deadline to pass.
///
/// Output lines reach `callback` while the process runs; full stdout and
/// stderr are also captured into the result. When `deadline` passes before
/// the process exits, the child is killed and the result is marked
/// `timed_out` (per-line delivery may lag by up to the poll interval).
///
/// # Errors
///
/// Returns `StepLaunchError` if the process cannot be spawned at all.
pub fn run_streaming(
    program: &str,
    args: &[String],
    options: &CommandOptions,
    deadline: Option<Instant>,
    callback: OutputCallback,
) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|e| GantryError::StepLaunchError {
        step: program.to_string(),
        message: e.to_string(),
    })?;

    // Reader threads keep the pipes drained regardless of how slowly the
    // parent polls, so a chatty child never blocks on a full pipe buffer.
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (tx, rx) = mpsc::channel();
    let tx_stdout = tx.clone();
    let tx_stderr = tx;

    let stdout_handle = thread::spawn(move || {
        let mut output = String::new();
        if let Some(stdout) = stdout {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(std::result::Result::ok) {
                output.push_str(&line);
                output.push('\n');
                let _ = tx_stdout.send(OutputLine::Stdout(line));
            }
        }
        output
    });

    let stderr_handle = thread::spawn(move || {
        let mut output = String::new();
        if let Some(stderr) = stderr {
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(std::result::Result::ok) {
                output.push_str(&line);
                output.push('\n');
                let _ = tx_stderr.send(OutputLine::Stderr(line));
            }
        }
        output
    });

    // Wait for exit or deadline, forwarding output as it arrives.
    let mut timed_out = false;
    let status = loop {
        while let Ok(line) = rx.try_recv() {
            callback(line);
        }

        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                return Err(GantryError::Io(e));
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            let _ = child.kill();
            timed_out = true;
            break None;
        }

        thread::sleep(POLL_INTERVAL);
    };

    // A killed child still needs reaping.
    let status = match status {
        Some(status) => Some(status),
        None => child.wait().ok(),
    };

    let stdout_output = stdout_handle.join().unwrap_or_default();
    let stderr_output = stderr_handle.join().unwrap_or_default();

    // Readers are done, so this drains every remaining line.
    while let Ok(line) = rx.try_recv() {
        callback(line);
    }

    let duration = start.elapsed();
    let exit_code = if timed_out {
        None
    } else {
        status.and_then(|s| s.code())
    };
    let success = !timed_out && status.is_some_and(|s| s.success());

    Ok(CommandResult {
        exit_code,
        timed_out,
        stdout: stdout_output,
        stderr: stderr_output,
        duration,
        success,
    })
}

/// Run a process and capture its output without streaming.
pub fn run_captured(
    program: &str,
    args: &[String],
    options: &CommandOptions,
    deadline: Option<Instant>,
) -> Result<CommandResult> {
    run_streaming(program, args, options, deadline, Box::new(|_| {}))
}
