//! Stage outcomes and their outward wire shape.
//!
//! Every stage invocation yields exactly one result - never zero, never
//! more than one. The serialized form is the contract the host consumes:
//! `{status: "success" | "error" | "pending", ...}` with produced fields
//! flattened into the success object.

use crate::context::StageConfig;
use crate::errors::{ErrorKind, StageError};
use serde::Serialize;

/// Tagged outcome of one stage invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StageResult {
    /// The stage completed and contributed fields downstream.
    Success {
        /// The verb this stage performed ("deploy", "configure", ...).
        action: String,
        /// Keys this stage contributes to the next stage's config.
        #[serde(flatten)]
        produced: StageConfig,
        /// Human-readable completion message.
        output: String,
    },

    /// The stage failed; the flow halts here.
    #[serde(rename = "error")]
    Failure {
        /// The verb this stage was performing.
        action: String,
        /// Human-readable description of what failed.
        error: String,
        /// Raw stdout of the failing external call, if captured.
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        /// Raw stderr of the failing external call, if captured.
        #[serde(skip_serializing_if = "Option::is_none")]
        stderr: Option<String>,
        /// Failure category. Diagnostic only; not part of the wire shape.
        #[serde(skip)]
        kind: ErrorKind,
    },

    /// The stage cannot proceed yet; an upstream dependency has not
    /// arrived. Not an error - the driver may re-trigger later.
    Pending {
        /// The verb this stage was about to perform.
        action: String,
        /// What the stage is waiting for.
        message: String,
    },
}

impl StageResult {
    /// Creates a success result.
    #[must_use]
    pub fn success(
        action: impl Into<String>,
        produced: StageConfig,
        output: impl Into<String>,
    ) -> Self {
        Self::Success {
            action: action.into(),
            produced,
            output: output.into(),
        }
    }

    /// Creates a failure result from a categorized stage error.
    #[must_use]
    pub fn failure(action: impl Into<String>, error: StageError) -> Self {
        Self::Failure {
            action: action.into(),
            error: error.message,
            output: error.output,
            stderr: error.stderr,
            kind: error.kind,
        }
    }

    /// Creates a pending result.
    #[must_use]
    pub fn pending(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pending {
            action: action.into(),
            message: message.into(),
        }
    }

    /// The wire status tag.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure { .. } => "error",
            Self::Pending { .. } => "pending",
        }
    }

    /// The action verb of this result.
    #[must_use]
    pub fn action(&self) -> &str {
        match self {
            Self::Success { action, .. }
            | Self::Failure { action, .. }
            | Self::Pending { action, .. } => action,
        }
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Returns true if the stage is waiting on an upstream dependency.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Fields this result contributes downstream, when successful.
    #[must_use]
    pub const fn produced_fields(&self) -> Option<&StageConfig> {
        match self {
            Self::Success { produced, .. } => Some(produced),
            _ => None,
        }
    }

    /// The failure category, when failed.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The human-readable message of this result, whatever its status.
    #[must_use]
    pub fn human_message(&self) -> &str {
        match self {
            Self::Success { output, .. } => output,
            Self::Failure { error, .. } => error,
            Self::Pending { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_wire_shape() {
        let produced = StageConfig::new().with("consumerUrl", "https://consumer-node-abc123.run.app");
        let result = StageResult::success(
            "deploy",
            produced,
            "Deployed consumer node to https://consumer-node-abc123.run.app",
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "success",
                "action": "deploy",
                "consumerUrl": "https://consumer-node-abc123.run.app",
                "output": "Deployed consumer node to https://consumer-node-abc123.run.app",
            })
        );
    }

    #[test]
    fn test_failure_wire_shape_preserves_raw_output() {
        let err = StageError::deploy("Deployment to Cloud Run failed: quota exceeded")
            .with_output("deploying...")
            .with_stderr("ERROR: quota exceeded");
        let result = StageResult::failure("deploy", err);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "error",
                "action": "deploy",
                "error": "Deployment to Cloud Run failed: quota exceeded",
                "output": "deploying...",
                "stderr": "ERROR: quota exceeded",
            })
        );
    }

    #[test]
    fn test_failure_wire_shape_omits_absent_output() {
        let result = StageResult::failure(
            "deploy",
            StageError::config("Missing required configuration: projectId"),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "error",
                "action": "deploy",
                "error": "Missing required configuration: projectId",
            })
        );
    }

    #[test]
    fn test_pending_wire_shape() {
        let result = StageResult::pending("deploy", "Waiting for proxy URL before deploying");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "pending",
                "action": "deploy",
                "message": "Waiting for proxy URL before deploying",
            })
        );
    }

    #[test]
    fn test_accessors() {
        let err = StageError::timeout("Deployment timed out after 30 attempts");
        let failure = StageResult::failure("deploy", err);

        assert_eq!(failure.status(), "error");
        assert_eq!(failure.action(), "deploy");
        assert!(failure.is_failure());
        assert_eq!(failure.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(failure.produced_fields(), None);
        assert_eq!(failure.human_message(), "Deployment timed out after 30 attempts");

        let success = StageResult::success("configure", StageConfig::new(), "ready");
        assert!(success.is_success());
        assert!(success.produced_fields().is_some());

        let pending = StageResult::pending("deploy", "waiting");
        assert!(pending.is_pending());
        assert_eq!(pending.error_kind(), None);
    }
}
