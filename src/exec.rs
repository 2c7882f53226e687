//! Process execution collaborator
//!
//! Probes and handlers that shell out (`brew`, `subscription-manager`,
//! `yum`, `rpm`) go through [`ProcessRunner`] so tests can script command
//! output. Sensitive invocations are redacted wherever a command line is
//! rendered.

use std::process::Command;

use convergence::{ExecutionError, ProbeError};

/// Captured output of one external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            success: true,
        }
    }

    pub fn failed(stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            success: false,
        }
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// One command invocation: program, arguments, environment overrides
#[derive(Debug, Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    sensitive: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            sensitive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Mark the invocation as carrying secrets; arguments are redacted in
    /// logs and error messages
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// Rendering used in logs and errors
    pub fn display(&self) -> String {
        if self.sensitive {
            format!("{} <redacted>", self.program)
        } else if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Runs external commands, blocking the calling thread for the duration
/// of the subprocess
pub trait ProcessRunner: std::fmt::Debug + Send + Sync {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;
}

/// Runner backed by [`std::process::Command`]
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        log::debug!("running {}", invocation.display());
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        Ok(cmd.output()?.into())
    }
}

/// Run a command for a probe. Spawn failures become [`ProbeError`]; a
/// non-zero exit is *not* an error here, since several probes (e.g.
/// `subscription-manager status` on an unregistered host) read stdout
/// regardless of exit status.
pub fn run_for_probe(
    runner: &dyn ProcessRunner,
    invocation: &Invocation,
) -> Result<CommandOutput, ProbeError> {
    runner.run(invocation).map_err(|e| ProbeError::Command {
        command: invocation.display(),
        reason: e.to_string(),
    })
}

/// Run a command for a handler and require success
pub fn run_checked(
    runner: &dyn ProcessRunner,
    invocation: &Invocation,
) -> Result<CommandOutput, ExecutionError> {
    let output = runner
        .run(invocation)
        .map_err(|e| ExecutionError::Command {
            command: invocation.display(),
            detail: e.to_string(),
        })?;

    if !output.success {
        return Err(ExecutionError::Command {
            command: invocation.display(),
            detail: output.stderr_str().trim().to_string(),
        });
    }

    Ok(output)
}
