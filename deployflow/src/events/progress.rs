//! Progress sink trait and implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::pipeline::RunId;

/// What happened at a point in a stage's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressKind {
    /// The stage began executing.
    StageStarted,
    /// An advisory status line, e.g. `"Waiting for deployment... (3/30)"`.
    Status {
        /// Human-readable status text.
        message: String,
    },
    /// The stage finished successfully.
    StageCompleted {
        /// The stage's human-readable success output.
        message: String,
    },
    /// The stage failed.
    StageFailed {
        /// The failure message.
        error: String,
    },
    /// The stage parked itself waiting on an upstream field.
    StagePending {
        /// Why the stage is holding.
        message: String,
    },
}

/// A structured progress notification from a pipeline run.
///
/// Events are advisory. A slow or failing sink must never change the
/// outcome of the stage that produced the event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: RunId,
    /// Name of the stage that produced the event.
    pub stage: String,
    /// When the event was produced (UTC).
    pub at: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub kind: ProgressKind,
}

impl ProgressEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(run_id: RunId, stage: impl Into<String>, kind: ProgressKind) -> Self {
        Self {
            run_id,
            stage: stage.into(),
            at: Utc::now(),
            kind,
        }
    }

    /// Returns the status text if this is a [`ProgressKind::Status`] event.
    #[must_use]
    pub fn status_message(&self) -> Option<&str> {
        match &self.kind {
            ProgressKind::Status { message } => Some(message),
            _ => None,
        }
    }
}

/// Trait for sinks that receive progress events.
///
/// Sinks are used for operator-facing feedback during long deployments:
/// rollout attempt counters, secret provisioning steps, stage outcomes.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Delivers an event asynchronously.
    async fn emit(&self, event: ProgressEvent);

    /// Delivers an event without blocking.
    ///
    /// This method must never panic. Delivery errors are suppressed.
    fn try_emit(&self, event: ProgressEvent);
}

/// A no-op sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn emit(&self, _event: ProgressEvent) {
        // Intentionally empty - discards all events
    }

    fn try_emit(&self, _event: ProgressEvent) {
        // Intentionally empty - discards all events
    }
}

/// A sink that maps events onto the tracing framework.
///
/// Stage failures log at warn, everything else at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl TracingProgress {
    fn log_event(event: &ProgressEvent) {
        match &event.kind {
            ProgressKind::StageStarted => {
                info!(run_id = %event.run_id, stage = %event.stage, "Stage started");
            }
            ProgressKind::Status { message } => {
                info!(run_id = %event.run_id, stage = %event.stage, "{message}");
            }
            ProgressKind::StageCompleted { message } => {
                info!(run_id = %event.run_id, stage = %event.stage, "{message}");
            }
            ProgressKind::StageFailed { error } => {
                warn!(run_id = %event.run_id, stage = %event.stage, "Stage failed: {error}");
            }
            ProgressKind::StagePending { message } => {
                info!(run_id = %event.run_id, stage = %event.stage, "Stage pending: {message}");
            }
        }
    }
}

#[async_trait]
impl ProgressSink for TracingProgress {
    async fn emit(&self, event: ProgressEvent) {
        Self::log_event(&event);
    }

    fn try_emit(&self, event: ProgressEvent) {
        Self::log_event(&event);
    }
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: parking_lot::RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns the events emitted by a particular stage.
    #[must_use]
    pub fn for_stage(&self, stage: &str) -> Vec<ProgressEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }

    /// Returns just the status texts, in emission order.
    #[must_use]
    pub fn status_messages(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter_map(|e| e.status_message().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl ProgressSink for CollectingProgress {
    async fn emit(&self, event: ProgressEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: ProgressEvent) {
        self.events.write().push(event);
    }
}
