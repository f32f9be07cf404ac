//! Sequential driver for the deployment stage list.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::info;

use crate::cancel::CancelToken;
use crate::context::PipelineMessage;
use crate::pipeline::{ActiveRuns, RunId};
use crate::stage::{StageExecutor, StageKind, StageResult};

/// Outcome of driving one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The run this report describes.
    pub run_id: RunId,
    /// Final flow state: cumulative config plus the last stage result.
    pub message: PipelineMessage,
    /// Stages that completed successfully, in execution order.
    pub completed: Vec<StageKind>,
    /// The stage the run halted at, if it did not finish the list.
    pub halted_at: Option<StageKind>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// True when every stage in the list completed successfully.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.halted_at.is_none()
    }

    /// The last stage result, if any stage ran.
    #[must_use]
    pub fn last_result(&self) -> Option<&StageResult> {
        self.message.payload.as_ref()
    }
}

/// Drives an ordered stage list over one executor.
///
/// One pipeline value carries one run identity: the executor's run id is
/// stamped on every progress event the run emits. Stages execute strictly
/// in order, each seeing the config merged from everything before it; the
/// driver halts at the first failure or pending result and never advances
/// past it.
#[derive(Debug, Clone)]
pub struct DeployPipeline {
    stages: Vec<StageKind>,
    executor: StageExecutor,
    registry: Option<Arc<ActiveRuns>>,
}

impl DeployPipeline {
    /// Creates a driver over the full stage catalog, in pipeline order.
    #[must_use]
    pub fn new(executor: StageExecutor) -> Self {
        Self::with_stages(executor, StageKind::ALL.to_vec())
    }

    /// Creates a driver over a custom stage list.
    #[must_use]
    pub fn with_stages(executor: StageExecutor, stages: Vec<StageKind>) -> Self {
        Self {
            stages,
            executor,
            registry: None,
        }
    }

    /// Attaches a registry the run reports itself to while in flight.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ActiveRuns>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The stage list, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    /// The run id this driver stamps on its events.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.executor.run_id()
    }

    /// A clone of the run's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.executor.cancel_token()
    }

    /// Runs the stage list to completion or first halt.
    ///
    /// On each success the stage's produced fields are merged into the
    /// flowing config before the next stage starts. A failure or pending
    /// result stops the walk; the remaining stages do not run.
    pub async fn run(&self, mut message: PipelineMessage) -> RunReport {
        let start = Instant::now();
        let run_id = self.executor.run_id();

        if let Some(registry) = &self.registry {
            registry.register(run_id, self.executor.cancel_token());
        }
        info!(run_id = %run_id, stages = self.stages.len(), "Pipeline run starting");

        let mut completed = Vec::new();
        let mut halted_at = None;
        for &kind in &self.stages {
            if let Some(registry) = &self.registry {
                registry.advance(run_id, kind);
            }

            let result = self.executor.run(kind, &message.config).await;
            message.apply(result);

            if message.can_advance() {
                completed.push(kind);
            } else {
                halted_at = Some(kind);
                break;
            }
        }

        if let Some(registry) = &self.registry {
            registry.finish(run_id);
        }

        match halted_at {
            None => info!(run_id = %run_id, "Pipeline run complete"),
            Some(stage) => info!(run_id = %run_id, stage = %stage, "Pipeline run halted"),
        }

        RunReport {
            run_id,
            message,
            completed,
            halted_at,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Drives several independent pipelines concurrently.
    ///
    /// Runs interleave freely at their suspension points; each run's own
    /// stages stay strictly ordered. Reports come back in completion
    /// order.
    pub async fn run_many(runs: Vec<(Self, PipelineMessage)>) -> Vec<RunReport> {
        let mut in_flight: FuturesUnordered<_> = runs
            .into_iter()
            .map(|(pipeline, message)| async move { pipeline.run(message).await })
            .collect();

        let mut reports = Vec::with_capacity(in_flight.len());
        while let Some(report) = in_flight.next().await {
            reports.push(report);
        }
        reports
    }
}
