//! External process execution.
//!
//! Version and publish commands are user-supplied strings split on
//! whitespace (no shell). The [`CommandRunner`] trait lets the orchestrator
//! be driven by a fake in tests.

use std::process::Command;
use std::time::Instant;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors from running an external command.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The command string had no program in it.
    #[error("empty command")]
    EmptyCommand,

    /// The program could not be started.
    #[error("failed to run {program}: {source}")]
    Exec {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The program exited unsuccessfully.
    #[error("{command} failed: {stderr}")]
    NonZero {
        /// Full command line.
        command: String,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for process operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

impl ProcessOutput {
    /// Stdout followed by stderr, one stream per line group.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs external programs.
pub trait CommandRunner {
    /// Run `program` with `args` in `cwd` and capture its output.
    ///
    /// A non-zero exit is a [`ProcessError::NonZero`].
    fn run(&mut self, program: &str, args: &[String], cwd: &Utf8Path) -> ProcessResult<ProcessOutput>;
}

/// Runs programs with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip(self, args), fields(args = ?args))]
    fn run(&mut self, program: &str, args: &[String], cwd: &Utf8Path) -> ProcessResult<ProcessOutput> {
        let start = Instant::now();
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd.as_std_path())
            .output()
            .map_err(|source| ProcessError::Exec {
                program: program.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        for line in stdout.lines().chain(stderr.lines()) {
            info!(target: "changepr::process::output", "{line}");
        }
        debug!(elapsed = ?start.elapsed(), status = ?output.status.code(), "command finished");

        if !output.status.success() {
            return Err(ProcessError::NonZero {
                command: std::iter::once(program.to_string())
                    .chain(args.iter().cloned())
                    .collect::<Vec<_>>()
                    .join(" "),
                exit_code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ProcessOutput { stdout, stderr })
    }
}

/// Split a command string on whitespace into program and arguments.
pub fn split_command(command: &str) -> ProcessResult<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next().ok_or(ProcessError::EmptyCommand)?;
    Ok((program, parts.collect()))
}

/// Convenience wrapper: split `command` and run it.
pub fn run_command_line(
    runner: &mut dyn CommandRunner,
    command: &str,
    cwd: &Utf8Path,
) -> ProcessResult<ProcessOutput> {
    let (program, args) = split_command(command)?;
    runner.run(&program, &args, cwd)
}
