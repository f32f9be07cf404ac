//! Configuration propagation between stages.
//!
//! This module provides:
//! - The merged, ordered parameter bag each stage reads ([`StageConfig`])
//! - The message flowing between stages ([`PipelineMessage`]), whose
//!   config only ever grows and whose payload is the latest stage result

mod config;
mod message;

pub use config::StageConfig;
pub use message::PipelineMessage;
