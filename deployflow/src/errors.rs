//! Error types for the deployment pipeline.
//!
//! Every failure a stage can surface falls into one of the [`ErrorKind`]
//! categories. Errors from external tooling keep the raw stdout/stderr of
//! the failing call so operators can diagnose without re-running anything.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a stage failure.
///
/// `Config` means the stage refused to start and no side effect was
/// attempted. Every other kind may leave external state behind; the
/// side-effect model is at-least-once and nothing is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required configuration field is missing or invalid.
    Config,
    /// The secret store rejected a create/version/access-grant request.
    SecretStore,
    /// Image pull, retag, or push failed.
    ImagePublish,
    /// The deployment request itself was rejected.
    Deploy,
    /// The poller exhausted its attempt budget.
    Timeout,
    /// A status probe returned a hard backend error (not "not ready").
    ProbeFailed,
    /// The run was cancelled between sub-operations.
    Cancelled,
}

impl ErrorKind {
    /// Stable lowercase name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::SecretStore => "secret_store",
            Self::ImagePublish => "image_publish",
            Self::Deploy => "deploy",
            Self::Timeout => "timeout",
            Self::ProbeFailed => "probe_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized stage failure with the underlying tool output preserved.
///
/// The message is human-readable prose identifying the failing
/// sub-operation plus the external tool's own error text. It never
/// escapes the stage executor; it becomes the stage's failure result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StageError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable description of what failed.
    pub message: String,
    /// Captured stdout of the failing external call, if any.
    pub output: Option<String>,
    /// Captured stderr of the failing external call, if any.
    pub stderr: Option<String>,
}

impl StageError {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            output: None,
            stderr: None,
        }
    }

    /// Missing or invalid configuration; no side effects were attempted.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Secret store operation failed.
    #[must_use]
    pub fn secret_store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SecretStore, message)
    }

    /// Image publish operation failed.
    #[must_use]
    pub fn image_publish(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImagePublish, message)
    }

    /// Deployment request rejected.
    #[must_use]
    pub fn deploy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Deploy, message)
    }

    /// Poll attempt budget exhausted.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Status probe returned a hard error.
    #[must_use]
    pub fn probe_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProbeFailed, message)
    }

    /// Run cancelled between sub-operations.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, reason)
    }

    /// Attaches captured stdout. Empty output is not recorded.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        let output = output.into();
        if !output.is_empty() {
            self.output = Some(output);
        }
        self
    }

    /// Attaches captured stderr. Empty output is not recorded.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        if !stderr.is_empty() {
            self.stderr = Some(stderr);
        }
        self
    }

    /// Prefixes the message with an identifying context line.
    #[must_use]
    pub fn contextualize(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix}: {}", self.message);
        self
    }
}

/// Error from a single backend client operation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// An external command exited unsuccessfully.
    #[error("{message}")]
    Command {
        /// Description of the failing command and its error text.
        message: String,
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },

    /// A service or resource the operation needs does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The operation could not be started at all.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Creates a command failure from captured output.
    #[must_use]
    pub fn command(
        message: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Command {
            message: message.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Captured stdout of the failing call, when there is one.
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Command { stdout, .. } if !stdout.is_empty() => Some(stdout),
            _ => None,
        }
    }

    /// Captured stderr of the failing call, when there is one.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Command { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }

    /// Folds this error into a [`StageError`] of the given kind, carrying
    /// over whatever raw output was captured.
    #[must_use]
    pub fn into_stage_error(self, kind: ErrorKind, context: &str) -> StageError {
        let mut stage_err = StageError::new(kind, format!("{context}: {self}"));
        if let Some(stdout) = self.stdout() {
            stage_err = stage_err.with_output(stdout.to_string());
        }
        if let Some(stderr) = self.stderr() {
            stage_err = stage_err.with_stderr(stderr.to_string());
        }
        stage_err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_kind_names_are_stable() {
        assert_eq!(ErrorKind::Config.as_str(), "config");
        assert_eq!(ErrorKind::SecretStore.as_str(), "secret_store");
        assert_eq!(ErrorKind::ImagePublish.as_str(), "image_publish");
        assert_eq!(ErrorKind::Deploy.as_str(), "deploy");
        assert_eq!(ErrorKind::Timeout.as_str(), "timeout");
        assert_eq!(ErrorKind::ProbeFailed.as_str(), "probe_failed");
        assert_eq!(ErrorKind::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn stage_error_keeps_raw_output() {
        let err = StageError::deploy("Deployment to Cloud Run failed")
            .with_output("partial rollout log")
            .with_stderr("ERROR: quota exceeded");

        assert_eq!(err.kind, ErrorKind::Deploy);
        assert_eq!(err.output.as_deref(), Some("partial rollout log"));
        assert_eq!(err.stderr.as_deref(), Some("ERROR: quota exceeded"));
    }

    #[test]
    fn empty_output_is_not_attached() {
        let err = StageError::image_publish("push failed").with_output("").with_stderr("");
        assert_eq!(err.output, None);
        assert_eq!(err.stderr, None);
    }

    #[test]
    fn contextualize_prefixes_message() {
        let err = StageError::secret_store("permission denied").contextualize("consumer stage");
        assert_eq!(err.message, "consumer stage: permission denied");
    }

    #[test]
    fn backend_error_exposes_captured_streams() {
        let err = BackendError::command("docker push failed", "pushed 3 layers", "denied");
        assert_eq!(err.stdout(), Some("pushed 3 layers"));
        assert_eq!(err.stderr(), Some("denied"));

        let not_found = BackendError::NotFound("service consumer-node".into());
        assert_eq!(not_found.stdout(), None);
        assert_eq!(not_found.to_string(), "service consumer-node not found");
    }

    #[test]
    fn backend_error_folds_into_stage_error() {
        let backend = BackendError::command("gcloud run deploy failed", "", "ERROR: image not found");
        let staged = backend.into_stage_error(ErrorKind::Deploy, "Deployment to Cloud Run failed");

        assert_eq!(staged.kind, ErrorKind::Deploy);
        assert!(staged.message.contains("gcloud run deploy failed"));
        assert_eq!(staged.stderr.as_deref(), Some("ERROR: image not found"));
        assert_eq!(staged.output, None);
    }
}
