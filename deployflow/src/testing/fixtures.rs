//! Ready-made configs and messages for deployment tests.

use crate::context::{PipelineMessage, StageConfig};
use crate::stage::platform_defaults;

/// Project id used across fixtures.
pub const TEST_PROJECT: &str = "morpheus-test-project";

/// Merged config carrying everything the deploy stages require, including
/// an upstream proxy URL.
#[must_use]
pub fn full_deploy_config() -> StageConfig {
    config_awaiting_proxy().with("proxyUrl", "https://proxy-x.example")
}

/// Deploy config with credentials and platform settings but no proxy URL
/// yet, as the consumer and web app see it when run out of order.
#[must_use]
pub fn config_awaiting_proxy() -> StageConfig {
    platform_defaults().overlaid_with(
        &StageConfig::new()
            .with("projectId", TEST_PROJECT)
            .with("consumerUsername", "test-admin")
            .with("consumerPassword", "test-password"),
    )
}

/// Message carrying the full deploy config.
#[must_use]
pub fn deploy_message() -> PipelineMessage {
    PipelineMessage::with_config(full_deploy_config())
}
