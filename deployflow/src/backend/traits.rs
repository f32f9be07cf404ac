//! Backend client traits.
//!
//! Each operation maps 1:1 to one external side effect. Implementations are
//! stateless with respect to the pipeline: every readiness check is a fresh
//! backend call, never a cached answer.

use async_trait::async_trait;

use crate::backend::{DeployMode, DeploymentTarget};
use crate::errors::BackendError;
use crate::poller::PollOutcome;

/// Whether an ensure-secret call created the secret or appended a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretDisposition {
    /// The secret did not exist and was created.
    Created,
    /// The secret existed; a new version was added.
    VersionAdded,
}

/// Deploys services and reports on their rollout state.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Submits a deployment request.
    ///
    /// Returns once the request is accepted, without waiting for rollout.
    async fn deploy(
        &self,
        target: &DeploymentTarget,
        mode: DeployMode,
    ) -> Result<(), BackendError>;

    /// One non-blocking readiness check for a deployed service.
    ///
    /// The platform's ready condition maps to `Ready`; an absent or false
    /// condition (including a service still materializing after a fresh
    /// deploy) maps to `NotReadyYet`; a hard backend error maps to `Failed`.
    async fn describe_status(
        &self,
        service_name: &str,
        region: &str,
    ) -> PollOutcome<(), BackendError>;

    /// Resolves the public URL of a deployed service.
    async fn service_url(&self, service_name: &str, region: &str)
        -> Result<String, BackendError>;
}

/// Moves container images between registries.
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    /// Pulls `source`, retags it as `target`, pushes `target`.
    ///
    /// All three steps or failure. A partial tag-without-push surfaces as
    /// an error, never a silent retry.
    async fn publish(&self, source: &str, target: &str) -> Result<(), BackendError>;

    /// Registry manifest probe: does the image exist at all?
    async fn manifest_exists(&self, image: &str) -> Result<bool, BackendError>;
}

/// Provisions secrets and access to them.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Creates the secret if absent, otherwise appends a new version.
    ///
    /// Idempotent: calling twice with the same content never attempts a
    /// duplicate create.
    async fn ensure_secret(
        &self,
        name: &str,
        content: &str,
    ) -> Result<SecretDisposition, BackendError>;

    /// Grants the active deployer identity secret read access in a project.
    async fn ensure_access(&self, project_id: &str, role: &str) -> Result<(), BackendError>;
}

/// Probes a deployed service's health endpoint.
#[async_trait]
pub trait HealthProber: Send + Sync {
    /// One probe against the given URL.
    ///
    /// A healthy response maps to `Ready`; an unhealthy response or a
    /// transport error maps to `NotReadyYet`, since absence is expected
    /// while a service warms up.
    async fn probe(&self, url: &str) -> PollOutcome<(), BackendError>;
}
