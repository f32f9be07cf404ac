//! The message passed from stage to stage.

use crate::context::StageConfig;
use crate::stage::StageResult;
use serde::Serialize;

/// One unit of pipeline flow: cumulative configuration plus the most
/// recent stage result.
///
/// `config` only grows - a later stage never removes a field written by
/// an earlier one. `payload` always reflects the last-completed stage and
/// is replaced wholesale, never merged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMessage {
    /// Cumulative config merged across all stages executed so far.
    pub config: StageConfig,
    /// The most recent stage result, if any stage has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<StageResult>,
}

impl PipelineMessage {
    /// Creates an empty message (a fresh trigger with no upstream state).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message seeded with initial configuration.
    #[must_use]
    pub fn with_config(config: StageConfig) -> Self {
        Self {
            config,
            payload: None,
        }
    }

    /// Applies one stage's result: on success the produced fields are
    /// merged into `config` (newer value wins a collision); on failure or
    /// pending the config is left untouched. The payload is replaced
    /// either way.
    pub fn apply(&mut self, result: StageResult) {
        if let Some(produced) = result.produced_fields() {
            self.config.extend(produced);
        }
        self.payload = Some(result);
    }

    /// Returns true if the flow may advance to the next stage.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.payload.as_ref().map_or(true, StageResult::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_merges_produced_fields() {
        let mut msg = PipelineMessage::with_config(
            StageConfig::new().with("projectId", "test-project"),
        );

        let produced = StageConfig::new().with("proxyUrl", "https://proxy-x.example/");
        msg.apply(StageResult::success("deploy", produced, "deployed"));

        assert_eq!(msg.config.get_str("projectId"), Some("test-project"));
        assert_eq!(msg.config.get_str("proxyUrl"), Some("https://proxy-x.example/"));
        assert!(msg.can_advance());
    }

    #[test]
    fn test_failure_leaves_config_untouched() {
        let mut msg = PipelineMessage::with_config(
            StageConfig::new().with("projectId", "test-project"),
        );

        msg.apply(StageResult::failure(
            "deploy",
            StageError::deploy("Deployment to Cloud Run failed"),
        ));

        assert_eq!(msg.config.len(), 1);
        assert!(msg.payload.as_ref().is_some_and(StageResult::is_failure));
        assert!(!msg.can_advance());
    }

    #[test]
    fn test_pending_halts_without_config_changes() {
        let mut msg = PipelineMessage::new();
        msg.apply(StageResult::pending("deploy", "Waiting for proxy URL before deploying"));

        assert!(msg.config.is_empty());
        assert!(!msg.can_advance());
    }

    #[test]
    fn test_payload_replaced_wholesale() {
        let mut msg = PipelineMessage::new();

        msg.apply(StageResult::success(
            "configure",
            StageConfig::new().with("region", "us-west1"),
            "configured",
        ));
        msg.apply(StageResult::success(
            "deploy",
            StageConfig::new().with("proxyUrl", "https://proxy.example"),
            "deployed",
        ));

        // Config accumulated; payload is only the latest result
        assert!(msg.config.contains_key("region"));
        assert!(msg.config.contains_key("proxyUrl"));
        let payload = msg.payload.as_ref().unwrap();
        assert_eq!(payload.action(), "deploy");
        assert!(payload.produced_fields().is_some_and(|p| !p.contains_key("region")));
    }
}
