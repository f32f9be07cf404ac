//! Image publishing via the `docker` CLI.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::backend::command::{CommandRunner, CommandSpec, SystemCommandRunner};
use crate::backend::ImagePublisher;
use crate::errors::BackendError;

/// Publishes images by pulling from the source registry, retagging, and
/// pushing to the target registry.
pub struct DockerPublisher {
    runner: Arc<dyn CommandRunner>,
}

impl DockerPublisher {
    /// Creates a publisher using the given runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Publisher wired to the host `docker` binary.
    #[must_use]
    pub fn with_system_runner() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }

    async fn docker(&self, args: &[&str], context: String) -> Result<(), BackendError> {
        let output = self
            .runner
            .run(CommandSpec::new("docker").args(args.iter().copied()))
            .await?;
        if output.success {
            Ok(())
        } else {
            Err(output.into_failure(context))
        }
    }
}

#[async_trait]
impl ImagePublisher for DockerPublisher {
    async fn publish(&self, source: &str, target: &str) -> Result<(), BackendError> {
        debug!(%source, %target, "Publishing image");

        self.docker(&["pull", source], format!("docker pull {source} failed"))
            .await?;
        self.docker(
            &["tag", source, target],
            format!("docker tag {source} {target} failed"),
        )
        .await?;
        self.docker(&["push", target], format!("docker push {target} failed"))
            .await?;

        Ok(())
    }

    async fn manifest_exists(&self, image: &str) -> Result<bool, BackendError> {
        let output = self
            .runner
            .run(CommandSpec::new("docker").args(["manifest", "inspect", image]))
            .await?;
        Ok(output.success)
    }
}
