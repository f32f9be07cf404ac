//! Progress event system for operator-facing feedback.
//!
//! Stages emit structured [`ProgressEvent`]s as they move through secret
//! provisioning, image publish, deploy, and rollout polling. Sinks are
//! advisory: emission never affects stage outcomes.

mod progress;

pub use progress::{
    CollectingProgress, NoopProgress, ProgressEvent, ProgressKind, ProgressSink, TracingProgress,
};
