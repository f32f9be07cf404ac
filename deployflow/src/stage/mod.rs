//! Stage catalog, results, and the executor.
//!
//! This module provides:
//! - The declarative catalog of stages and their per-invocation plans
//! - The stage result wire shape
//! - The executor that turns one stage invocation into exactly one result

mod definition;
mod executor;
mod result;

pub use definition::{
    platform_defaults, HealthPlan, ImageFlow, PlannedStage, SecretRequirement, StageKind,
    StagePlan, COOKIE_MOUNT_PATH, DEFAULT_POLL, SECRET_ACCESS_ROLE, WEBAPP_ROLLOUT_POLL,
};
pub use executor::StageExecutor;
pub use result::StageResult;
