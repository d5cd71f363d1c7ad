use std::ffi::OsString;
use std::io;
use std::process::{Command, Stdio};

use tracing::trace;

use crate::constants::CLICKHOUSE_CLIENT_BIN;
use crate::{Error, Result};

/// A single `clickhouse-client` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub database: String,
    pub host:     String,
    pub port:     u16,
    pub query:    String,
}

impl CliInvocation {
    /// Arguments in the order `clickhouse-client` expects them.
    pub fn args(&self) -> [String; 8] {
        [
            "--database".into(),
            self.database.clone(),
            "--host".into(),
            self.host.clone(),
            "--port".into(),
            self.port.to_string(),
            "--query".into(),
            self.query.clone(),
        ]
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self { stdout: stdout.into(), stderr: stderr.into() }
    }

    /// Decoded stdout, or [`Error::CommandFailure`] if anything was written to stderr.
    ///
    /// The exit status is not consulted: `clickhouse-client` reports errors on stderr.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailure`] on any stderr output, [`Error::FromUtf8`] if stdout is
    /// not valid UTF-8.
    pub fn into_stdout(self) -> Result<String> {
        if !self.stderr.is_empty() {
            return Err(Error::CommandFailure {
                stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8(self.stdout)?)
    }
}

/// Runs [`CliInvocation`]s to completion, blocking the calling thread.
pub trait CommandRunner: Send + Sync {
    /// # Errors
    ///
    /// Returns an error only if the command could not be run at all.
    fn run(&self, invocation: &CliInvocation) -> io::Result<CommandOutput>;
}

/// Spawns the real `clickhouse-client` executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program:      OsString,
    leading_args: Vec<OsString>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self { program: program.into(), leading_args: Vec::new() }
    }

    /// Arguments placed before the invocation's own, ie `clickhouse` + `client`.
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ProcessRunner {
    fn default() -> Self { Self::new(CLICKHOUSE_CLIENT_BIN) }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &CliInvocation) -> io::Result<CommandOutput> {
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(invocation.args())
            .stdin(Stdio::null())
            .output()?;
        trace!(
            program = ?self.program,
            status = %output.status,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "command finished"
        );
        Ok(CommandOutput { stdout: output.stdout, stderr: output.stderr })
    }
}
