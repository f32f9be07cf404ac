//! Cloud Run deployment backend driven by the `gcloud` CLI.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::backend::command::{CommandRunner, CommandSpec, SystemCommandRunner};
use crate::backend::{DeployMode, DeploymentBackend, DeploymentTarget};
use crate::errors::BackendError;
use crate::poller::PollOutcome;

/// Deploys services with `gcloud run` commands.
///
/// Every operation is one (or for deploys, exactly one) CLI invocation;
/// no state is cached between calls.
pub struct GcloudBackend {
    runner: Arc<dyn CommandRunner>,
}

impl GcloudBackend {
    /// Creates a backend using the given runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Backend wired to the host `gcloud` binary.
    #[must_use]
    pub fn with_system_runner() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }

    fn env_flag_value(target: &DeploymentTarget) -> Option<String> {
        if target.env_vars.is_empty() {
            return None;
        }
        let joined = target
            .env_vars
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        Some(joined)
    }

    fn secrets_flag_value(target: &DeploymentTarget) -> Option<String> {
        if target.secret_mounts.is_empty() {
            return None;
        }
        let joined = target
            .secret_mounts
            .iter()
            .map(|m| format!("{}={}:{}", m.mount_path, m.secret_name, m.version))
            .collect::<Vec<_>>()
            .join(",");
        Some(joined)
    }

    fn deploy_spec(target: &DeploymentTarget, mode: DeployMode) -> CommandSpec {
        match mode {
            DeployMode::Create => {
                let mut spec = CommandSpec::new("gcloud")
                    .args(["run", "deploy"])
                    .arg(target.service_name.as_str())
                    .arg(format!("--image={}", target.image))
                    .arg("--platform=managed")
                    .arg(format!("--region={}", target.region))
                    .arg("--allow-unauthenticated");
                if let Some(port) = target.port {
                    spec = spec.arg(format!("--port={port}"));
                }
                if let Some(secrets) = Self::secrets_flag_value(target) {
                    spec = spec.arg(format!("--set-secrets={secrets}"));
                }
                if let Some(env) = Self::env_flag_value(target) {
                    spec = spec.arg(format!("--set-env-vars={env}"));
                }
                spec
            }
            DeployMode::Update => {
                let mut spec = CommandSpec::new("gcloud")
                    .args(["run", "services", "update"])
                    .arg(target.service_name.as_str())
                    .arg(format!("--image={}", target.image))
                    .arg(format!("--region={}", target.region))
                    .arg("--platform=managed");
                if let Some(env) = Self::env_flag_value(target) {
                    spec = spec.arg(format!("--update-env-vars={env}"));
                }
                spec
            }
        }
    }
}

/// A failing describe right after a deploy request usually means the
/// service has not materialized yet, which is warm-up, not an error.
fn service_still_materializing(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("cannot find service") || lower.contains("not found")
}

#[async_trait]
impl DeploymentBackend for GcloudBackend {
    async fn deploy(
        &self,
        target: &DeploymentTarget,
        mode: DeployMode,
    ) -> Result<(), BackendError> {
        debug!(
            service = %target.service_name,
            image = %target.image,
            ?mode,
            "Submitting deployment request"
        );
        let verb = match mode {
            DeployMode::Create => "deploy",
            DeployMode::Update => "update",
        };
        let output = self.runner.run(Self::deploy_spec(target, mode)).await?;
        if output.success {
            Ok(())
        } else {
            Err(output.into_failure(format!(
                "gcloud run {verb} {} failed",
                target.service_name
            )))
        }
    }

    async fn describe_status(
        &self,
        service_name: &str,
        region: &str,
    ) -> PollOutcome<(), BackendError> {
        let region_flag = format!("--region={region}");
        let spec = CommandSpec::new("gcloud").args([
            "run",
            "services",
            "describe",
            service_name,
            region_flag.as_str(),
            "--format=value(status.conditions[0].status)",
        ]);
        match self.runner.run(spec).await {
            Ok(output) if output.success => {
                if output.stdout_trimmed() == "True" {
                    PollOutcome::Ready(())
                } else {
                    PollOutcome::NotReadyYet
                }
            }
            Ok(output) => {
                if service_still_materializing(&output.stderr) {
                    PollOutcome::NotReadyYet
                } else {
                    PollOutcome::Failed(output.into_failure(format!(
                        "gcloud run services describe {service_name} failed"
                    )))
                }
            }
            Err(err) => PollOutcome::Failed(err),
        }
    }

    async fn service_url(
        &self,
        service_name: &str,
        region: &str,
    ) -> Result<String, BackendError> {
        let region_flag = format!("--region={region}");
        let spec = CommandSpec::new("gcloud").args([
            "run",
            "services",
            "describe",
            service_name,
            region_flag.as_str(),
            "--format=value(status.url)",
        ]);
        let output = self.runner.run(spec).await?;
        if !output.success {
            return Err(output.into_failure(format!(
                "gcloud run services describe {service_name} failed"
            )));
        }
        let url = output.stdout_trimmed().to_string();
        if url.is_empty() {
            return Err(BackendError::NotFound(format!(
                "URL for service {service_name}"
            )));
        }
        Ok(url)
    }
}
