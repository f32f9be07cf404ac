//! Structured subprocess execution.
//!
//! Backend adapters never build shell strings. They describe an invocation
//! as a [`CommandSpec`] (program, argv, optional stdin) and hand it to a
//! [`CommandRunner`]. The trait seam lets adapter unit tests assert on the
//! exact argv without spawning anything.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::errors::BackendError;

/// One external command invocation.
///
/// Stdin is used for piping secret content to tools that accept
/// `--data-file=-`; it is redacted from `Debug` output so specs can be
/// logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
}

impl CommandSpec {
    /// Starts a spec for the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feeds the given data to the process on stdin.
    #[must_use]
    pub fn with_stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// The program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector, excluding the program itself.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// The stdin payload, if any.
    #[must_use]
    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Single-line rendering for log and error messages. Stdin is omitted.
    #[must_use]
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything the process wrote to stdout.
    pub stdout: String,
    /// Everything the process wrote to stderr.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
}

impl CommandOutput {
    /// Stdout with surrounding whitespace removed.
    #[must_use]
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Converts a failed run into a [`BackendError::Command`].
    ///
    /// The trimmed stderr is appended to `context` so the resulting message
    /// carries the tool's own error text; both raw streams are preserved.
    #[must_use]
    pub fn into_failure(self, context: impl Into<String>) -> BackendError {
        let mut message = context.into();
        let stderr_text = self.stderr.trim().to_string();
        if !stderr_text.is_empty() {
            message.push_str(": ");
            message.push_str(&stderr_text);
        }
        BackendError::command(message, self.stdout, self.stderr)
    }
}

/// Executes command specs to completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command, capturing both output streams.
    ///
    /// A non-zero exit is not an `Err`; it comes back as a [`CommandOutput`]
    /// with `success == false` so callers can decide how to classify it.
    /// `Err` means the process could not be run at all.
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, BackendError>;
}

/// Runs commands on the host via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, BackendError> {
        tracing::debug!(command = %spec.display_line(), "Running command");

        let mut command = Command::new(spec.program());
        command
            .args(spec.argv())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if spec.stdin().is_some() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }

        let mut child = command.spawn()?;
        if let Some(data) = spec.stdin() {
            if let Some(mut handle) = child.stdin.take() {
                handle.write_all(data.as_bytes()).await?;
                handle.shutdown().await?;
            }
        }

        let output = child.wait_with_output().await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn spec_builds_argv_in_order() {
        let spec = CommandSpec::new("gcloud")
            .args(["run", "deploy", "proxy-node"])
            .arg("--platform=managed");

        assert_eq!(spec.program(), "gcloud");
        assert_eq!(
            spec.argv(),
            ["run", "deploy", "proxy-node", "--platform=managed"]
        );
        assert_eq!(
            spec.display_line(),
            "gcloud run deploy proxy-node --platform=managed"
        );
    }

    #[test]
    fn debug_redacts_stdin() {
        let spec = CommandSpec::new("gcloud")
            .args(["secrets", "create", "COOKIE_SECRET", "--data-file=-"])
            .with_stdin("admin:hunter2");

        let rendered = format!("{spec:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn system_runner_captures_stdout() {
        let output = SystemCommandRunner
            .run(CommandSpec::new("echo").arg("hello"))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout_trimmed(), "hello");
    }

    #[tokio::test]
    async fn system_runner_reports_nonzero_exit() {
        let output = SystemCommandRunner
            .run(CommandSpec::new("false"))
            .await
            .unwrap();

        assert!(!output.success);
    }

    #[tokio::test]
    async fn system_runner_feeds_stdin() {
        let output = SystemCommandRunner
            .run(CommandSpec::new("cat").with_stdin("piped content"))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout, "piped content");
    }

    #[tokio::test]
    async fn system_runner_errors_on_missing_program() {
        let result = SystemCommandRunner
            .run(CommandSpec::new("definitely-not-a-real-program-4712"))
            .await;

        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn into_failure_appends_stderr_to_context() {
        let output = CommandOutput {
            stdout: "partial".to_string(),
            stderr: "ERROR: denied\n".to_string(),
            success: false,
        };

        let err = output.into_failure("docker push gcr.io/p/img:v1 failed");
        assert_eq!(err.to_string(), "docker push gcr.io/p/img:v1 failed: ERROR: denied");
        assert_eq!(err.stdout(), Some("partial"));
    }

    #[test]
    fn into_failure_without_stderr_keeps_context_only() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            success: false,
        };

        let err = output.into_failure("gcloud run deploy proxy-node failed");
        assert_eq!(err.to_string(), "gcloud run deploy proxy-node failed");
    }
}
