//! Runs one stage's fixed sub-operation sequence against the backends.
//!
//! The executor owns no cloud state. It resolves the stage plan, walks the
//! sequence (secret, image, deploy, rollout wait, self-URL follow-up, health
//! check), and folds whatever happens into exactly one [`StageResult`].
//! Errors never escape this boundary. The cancellation token is checked
//! between sub-operations; an in-flight external effect is not rolled back.

use std::fmt;
use std::sync::Arc;

use crate::backend::{
    DeployMode, DeploymentBackend, DeploymentTarget, HealthProber, ImagePublisher, SecretStore,
};
use crate::cancel::CancelToken;
use crate::context::StageConfig;
use crate::errors::{BackendError, ErrorKind, StageError};
use crate::events::{NoopProgress, ProgressEvent, ProgressKind, ProgressSink};
use crate::pipeline::RunId;
use crate::poller::{poll_until_ready, PollError};
use crate::stage::{
    platform_defaults, HealthPlan, ImageFlow, PlannedStage, SecretRequirement, StageKind,
    StagePlan, StageResult, SECRET_ACCESS_ROLE,
};
use crate::utils::join_url;

/// Executes stages against a set of backend clients.
///
/// Cheap to clone; all backends are shared. One executor serves one
/// pipeline run: it carries that run's id, cancellation token, and
/// progress sink.
#[derive(Clone)]
pub struct StageExecutor {
    backend: Arc<dyn DeploymentBackend>,
    publisher: Arc<dyn ImagePublisher>,
    secrets: Arc<dyn SecretStore>,
    prober: Arc<dyn HealthProber>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
    run_id: RunId,
}

impl fmt::Debug for StageExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageExecutor")
            .field("run_id", &self.run_id)
            .finish()
    }
}

impl StageExecutor {
    /// Creates an executor with a fresh run id, no progress reporting, and
    /// an untripped cancellation token.
    #[must_use]
    pub fn new(
        backend: Arc<dyn DeploymentBackend>,
        publisher: Arc<dyn ImagePublisher>,
        secrets: Arc<dyn SecretStore>,
        prober: Arc<dyn HealthProber>,
    ) -> Self {
        Self {
            backend,
            publisher,
            secrets,
            prober,
            progress: Arc::new(NoopProgress),
            cancel: CancelToken::new(),
            run_id: RunId::new(),
        }
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the cancellation token observed between sub-operations.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the run id stamped onto progress events.
    #[must_use]
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// This executor's run id.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// A clone of the cancellation token, for callers that want to abort.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs one stage against the merged config and returns its result.
    ///
    /// Always yields exactly one result per invocation: success with
    /// produced fields, failure with a categorized error, or pending when
    /// the stage is holding for an upstream field.
    pub async fn run(&self, kind: StageKind, config: &StageConfig) -> StageResult {
        self.emit(kind, ProgressKind::StageStarted).await;

        let result = match kind {
            StageKind::Config => Self::run_config(config),
            StageKind::Proxy | StageKind::Consumer | StageKind::Webapp => {
                self.run_deploy(kind, config).await
            }
        };

        let closing = match &result {
            StageResult::Success { output, .. } => ProgressKind::StageCompleted {
                message: output.clone(),
            },
            StageResult::Failure { error, .. } => ProgressKind::StageFailed {
                error: error.clone(),
            },
            StageResult::Pending { message, .. } => ProgressKind::StagePending {
                message: message.clone(),
            },
        };
        self.emit(kind, closing).await;

        result
    }

    /// The config stage emits platform settings and touches nothing.
    fn run_config(upstream: &StageConfig) -> StageResult {
        let produced = platform_defaults().overlaid_with(upstream);
        let output = StageKind::Config.success_output("configure", "");
        StageResult::success("configure", produced, output)
    }

    async fn run_deploy(&self, kind: StageKind, config: &StageConfig) -> StageResult {
        let action = kind.default_action();

        let plan = match StagePlan::build(kind, config) {
            Ok(PlannedStage::Ready(plan)) => *plan,
            Ok(PlannedStage::Hold { message }) => {
                tracing::warn!(stage = %kind, %message, "stage holding for upstream field");
                return StageResult::pending(action, message);
            }
            Err(error) => return StageResult::failure(action, error),
        };
        if let Err(error) = plan.validate() {
            return StageResult::failure(action, error);
        }

        match self.execute_plan(&plan).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(
                    stage = %kind,
                    kind = %error.kind,
                    error = %error.message,
                    "stage failed"
                );
                StageResult::failure(action, error)
            }
        }
    }

    async fn execute_plan(&self, plan: &StagePlan) -> Result<StageResult, StageError> {
        let kind = plan.kind;

        if let Some(secret) = &plan.secret {
            self.check_cancelled()?;
            self.status(kind, "Creating secret...").await;
            self.ensure_secret(plan, secret).await?;
        }

        self.check_cancelled()?;
        self.publish_image(plan).await?;

        self.check_cancelled()?;
        self.status(kind, format!("Deploying {kind}...")).await;
        self.backend
            .deploy(&plan.target, plan.mode)
            .await
            .map_err(|error| error.into_stage_error(ErrorKind::Deploy, "Deployment failed"))?;

        let service_url = self.await_rollout(plan).await?;

        if let Some(env_key) = plan.self_url_env {
            self.check_cancelled()?;
            self.inject_self_url(plan, env_key, &service_url).await?;
        }

        self.check_cancelled()?;
        self.verify_health(plan, &service_url).await?;

        let produced = StageConfig::new().with(plan.url_field, service_url.clone());
        Ok(StageResult::success(
            plan.action.clone(),
            produced,
            plan.success_output(&service_url),
        ))
    }

    async fn ensure_secret(
        &self,
        plan: &StagePlan,
        secret: &SecretRequirement,
    ) -> Result<(), StageError> {
        let disposition = self
            .secrets
            .ensure_secret(&secret.name, &secret.content)
            .await
            .map_err(|error| {
                error.into_stage_error(
                    ErrorKind::SecretStore,
                    "Failed to create or update secret",
                )
            })?;
        tracing::debug!(stage = %plan.kind, secret = %secret.name, ?disposition, "secret ensured");

        self.secrets
            .ensure_access(&plan.project_id, SECRET_ACCESS_ROLE)
            .await
            .map_err(|error| {
                error.into_stage_error(ErrorKind::SecretStore, "Failed to grant secret access")
            })
    }

    async fn publish_image(&self, plan: &StagePlan) -> Result<(), StageError> {
        match &plan.image {
            ImageFlow::Publish { source, target } => {
                self.status(plan.kind, "Preparing image...").await;
                self.publisher.publish(source, target).await.map_err(|error| {
                    error.into_stage_error(ErrorKind::ImagePublish, "Failed to prepare image")
                })
            }
            ImageFlow::Direct { image } => {
                // Advisory only: a missing manifest warns but never fails.
                match self.publisher.manifest_exists(image).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(stage = %plan.kind, %image, "image not found in registry; deploying anyway");
                    }
                    Err(error) => {
                        tracing::warn!(stage = %plan.kind, %image, error = %error, "manifest check failed; deploying anyway");
                    }
                }
                Ok(())
            }
        }
    }

    async fn await_rollout(&self, plan: &StagePlan) -> Result<String, StageError> {
        let kind = plan.kind;
        let max_attempts = plan.rollout.max_attempts;
        let service = plan.target.service_name.as_str();
        let region = plan.target.region.as_str();

        poll_until_ready(&plan.rollout, &self.cancel, |attempt| async move {
            self.status(
                kind,
                format!("Waiting for deployment... ({attempt}/{max_attempts})"),
            )
            .await;
            self.backend.describe_status(service, region).await
        })
        .await
        .map_err(|error| rollout_failure(error, max_attempts))?;

        self.check_cancelled()?;
        self.backend
            .service_url(service, region)
            .await
            .map_err(|error| {
                error.into_stage_error(
                    ErrorKind::Deploy,
                    "Failed to get service URL after deployment",
                )
            })
    }

    async fn inject_self_url(
        &self,
        plan: &StagePlan,
        env_key: &str,
        service_url: &str,
    ) -> Result<(), StageError> {
        tracing::debug!(stage = %plan.kind, env_key, "updating service with its public URL");
        let update = DeploymentTarget::new(
            plan.target.service_name.clone(),
            plan.target.region.clone(),
            plan.target.image.clone(),
        )
        .with_env(env_key, service_url);

        self.backend
            .deploy(&update, DeployMode::Update)
            .await
            .map_err(|error| {
                error.into_stage_error(
                    ErrorKind::Deploy,
                    "Failed to update service with public URL",
                )
            })
    }

    async fn verify_health(&self, plan: &StagePlan, service_url: &str) -> Result<(), StageError> {
        let kind = plan.kind;
        let health_url = join_url(service_url, "/healthcheck");

        match &plan.health {
            HealthPlan::Required(policy) => {
                let max_attempts = policy.max_attempts;
                let url = health_url.as_str();
                poll_until_ready(policy, &self.cancel, |attempt| async move {
                    self.status(kind, format!("Checking health... ({attempt}/{max_attempts})"))
                        .await;
                    self.prober.probe(url).await
                })
                .await
                .map_err(|error| health_failure(error, max_attempts))?;
                Ok(())
            }
            HealthPlan::Advisory => {
                self.status(kind, "Checking health...").await;
                let outcome = self.prober.probe(&health_url).await;
                if !outcome.is_ready() {
                    tracing::warn!(stage = %kind, url = %health_url, "service deployed but health check failed");
                }
                Ok(())
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            Err(StageError::cancelled(self.cancel.reason_or_default()))
        } else {
            Ok(())
        }
    }

    async fn emit(&self, kind: StageKind, event: ProgressKind) {
        self.progress
            .emit(ProgressEvent::new(self.run_id, kind.name(), event))
            .await;
    }

    async fn status(&self, kind: StageKind, message: impl Into<String>) {
        self.emit(
            kind,
            ProgressKind::Status {
                message: message.into(),
            },
        )
        .await;
    }
}

fn rollout_failure(error: PollError<BackendError>, max_attempts: u32) -> StageError {
    match error {
        PollError::Timeout { .. } => {
            StageError::timeout(format!("Deployment timed out after {max_attempts} attempts"))
        }
        PollError::ProbeFailed(backend) => {
            backend.into_stage_error(ErrorKind::ProbeFailed, "Deployment status check failed")
        }
        PollError::Cancelled(reason) => StageError::cancelled(reason),
    }
}

fn health_failure(error: PollError<BackendError>, max_attempts: u32) -> StageError {
    match error {
        PollError::Timeout { .. } => {
            StageError::timeout(format!("Health check failed after {max_attempts} attempts"))
        }
        PollError::ProbeFailed(backend) => {
            backend.into_stage_error(ErrorKind::ProbeFailed, "Health check failed")
        }
        PollError::Cancelled(reason) => StageError::cancelled(reason),
    }
}
