//! # Deployflow
//!
//! Multi-stage cloud deployment pipeline orchestration.
//!
//! Deployflow drives a fixed sequence of deployment stages (config,
//! proxy, consumer, web app) against an abstract container platform:
//!
//! - **Stage catalog**: each stage declares its required config, secret,
//!   image flow, deployment target, and polling policies up front
//! - **One result per invocation**: success with produced fields, a
//!   categorized failure, or pending when an upstream URL has not arrived
//! - **Config propagation**: produced fields merge into the flowing
//!   config, so later stages see everything earlier stages published
//! - **Swappable backends**: Cloud Run via `gcloud` and Docker in
//!   production, recording fakes in tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deployflow::prelude::*;
//!
//! let executor = StageExecutor::new(backend, publisher, secrets, prober)
//!     .with_progress(Arc::new(TracingProgress));
//! let pipeline = DeployPipeline::new(executor);
//!
//! let report = pipeline
//!     .run(PipelineMessage::with_config(
//!         StageConfig::new().with("projectId", "my-project"),
//!     ))
//!     .await;
//! assert!(report.is_complete());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod cancel;
pub mod context;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod poller;
pub mod stage;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{
        DeployMode, DeploymentBackend, DeploymentTarget, HealthProber, ImagePublisher,
        SecretDisposition, SecretMount, SecretStore,
    };
    pub use crate::cancel::CancelToken;
    pub use crate::context::{PipelineMessage, StageConfig};
    pub use crate::errors::{BackendError, ErrorKind, StageError};
    pub use crate::events::{
        CollectingProgress, NoopProgress, ProgressEvent, ProgressKind, ProgressSink,
        TracingProgress,
    };
    pub use crate::pipeline::{ActiveRuns, DeployPipeline, RunId, RunReport, RunSnapshot};
    pub use crate::poller::{poll_until_ready, PollError, PollOutcome, PollPolicy};
    pub use crate::stage::{StageExecutor, StageKind, StagePlan, StageResult};
}
