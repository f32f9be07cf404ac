//! Testing utilities for deployment pipelines.
//!
//! This module provides:
//! - Recording fakes for every backend seam
//! - Ready-made configs and messages for deployment tests

mod fakes;
mod fixtures;

pub use fakes::{FakeBackend, FakeProber, FakePublisher, FakeSecrets, ScriptedPoll};
pub use fixtures::{config_awaiting_proxy, deploy_message, full_deploy_config, TEST_PROJECT};
