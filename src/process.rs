// SPDX-License-Identifier: GPL-3.0-only
//! External process execution
//!
//! Every backend is driven through a helper tool. Probes capture stdout and
//! hand it back as text; writes are detached and never awaited by the caller.

use std::fmt;
use std::process::Stdio;

use futures::future::BoxFuture;
use tokio::process::Command;

/// A program invocation with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs helper tools on behalf of the controllers
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion and return its stdout.
    ///
    /// A missing tool or a failed spawn yields an empty string.
    fn run(&self, command: &CommandLine) -> BoxFuture<'static, String>;

    /// Start a command and forget about it
    fn exec_detached(&self, command: &CommandLine);
}

/// Default runner backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    fn run(&self, command: &CommandLine) -> BoxFuture<'static, String> {
        let command = command.clone();
        Box::pin(async move {
            let output = Command::new(&command.program)
                .args(&command.args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .output()
                .await;

            match output {
                Ok(output) => {
                    if !output.status.success() {
                        debug!(command = %command, status = ?output.status, "Probe exited unsuccessfully");
                    }
                    String::from_utf8_lossy(&output.stdout).into_owned()
                }
                Err(e) => {
                    debug!(command = %command, error = %e, "Failed to run probe");
                    String::new()
                }
            }
        })
    }

    fn exec_detached(&self, command: &CommandLine) {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "Failed to spawn write command");
                return;
            }
        };

        // Reap in the background so the child does not linger as a zombie
        let command = command.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => trace!(command = %command, "Write command finished"),
                Ok(status) => warn!(command = %command, status = ?status, "Write command failed"),
                Err(e) => warn!(command = %command, error = %e, "Failed to wait for write command"),
            }
        });
    }
}
