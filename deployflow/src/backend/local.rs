//! Local Docker flavor of the deployment backend.
//!
//! Lets the same stages run against a developer machine: `deploy` becomes
//! `docker run -d`, readiness is the container's running state, and the
//! service URL resolves to `http://localhost:{port}`. Secret provisioning
//! and image publishing are no-ops locally.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::backend::command::{CommandRunner, CommandSpec, SystemCommandRunner};
use crate::backend::{
    DeployMode, DeploymentBackend, DeploymentTarget, ImagePublisher, SecretDisposition,
    SecretStore,
};
use crate::errors::BackendError;
use crate::poller::PollOutcome;

#[derive(Debug, Clone)]
struct LocalService {
    container: String,
    image: String,
    port: Option<u16>,
    env: BTreeMap<String, String>,
}

/// Runs services as local Docker containers.
pub struct LocalDockerBackend {
    runner: Arc<dyn CommandRunner>,
    /// Additional host ports to expose per service, e.g. the proxy's
    /// internal API port next to its public one.
    extra_ports: HashMap<String, Vec<u16>>,
    services: RwLock<HashMap<String, LocalService>>,
}

impl LocalDockerBackend {
    /// Creates a backend using the given runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            extra_ports: HashMap::new(),
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Backend wired to the host `docker` binary.
    #[must_use]
    pub fn with_system_runner() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }

    /// Maps additional ports for a service's containers.
    #[must_use]
    pub fn with_extra_ports(mut self, service: impl Into<String>, ports: Vec<u16>) -> Self {
        self.extra_ports.insert(service.into(), ports);
        self
    }

    fn container_name(service: &str) -> String {
        format!("{service}-local-{}", chrono::Utc::now().timestamp_millis())
    }

    async fn remove_container(&self, container: &str) {
        // Best effort; a missing container is fine.
        let spec = CommandSpec::new("docker").args(["rm", "-f", container]);
        if let Err(err) = self.runner.run(spec).await {
            debug!(%container, error = %err, "Could not remove old container");
        }
    }

    fn run_spec(&self, service: &str, record: &LocalService) -> CommandSpec {
        let mut spec = CommandSpec::new("docker")
            .args(["run", "-d", "--name"])
            .arg(record.container.as_str());
        if let Some(port) = record.port {
            spec = spec.arg("-p").arg(format!("{port}:{port}"));
        }
        for port in self.extra_ports.get(service).into_iter().flatten() {
            spec = spec.arg("-p").arg(format!("{port}:{port}"));
        }
        for (key, value) in &record.env {
            spec = spec.arg("-e").arg(format!("{key}={value}"));
        }
        spec.arg(record.image.as_str())
    }
}

#[async_trait]
impl DeploymentBackend for LocalDockerBackend {
    async fn deploy(
        &self,
        target: &DeploymentTarget,
        mode: DeployMode,
    ) -> Result<(), BackendError> {
        let previous = self.services.read().get(&target.service_name).cloned();

        let record = match mode {
            DeployMode::Create => LocalService {
                container: Self::container_name(&target.service_name),
                image: target.image.clone(),
                port: target.port,
                env: target.env_vars.clone(),
            },
            DeployMode::Update => match previous.clone() {
                Some(existing) => {
                    let mut env = existing.env;
                    env.extend(target.env_vars.clone());
                    LocalService {
                        container: Self::container_name(&target.service_name),
                        image: target.image.clone(),
                        port: target.port.or(existing.port),
                        env,
                    }
                }
                None => {
                    return Err(BackendError::NotFound(format!(
                        "local service {}",
                        target.service_name
                    )));
                }
            },
        };

        if let Some(old) = previous {
            self.remove_container(&old.container).await;
        }

        debug!(service = %target.service_name, container = %record.container, "Starting container");
        let output = self.runner.run(self.run_spec(&target.service_name, &record)).await?;
        if !output.success {
            return Err(output.into_failure(format!(
                "docker run failed for {}",
                target.service_name
            )));
        }

        self.services
            .write()
            .insert(target.service_name.clone(), record);
        Ok(())
    }

    async fn describe_status(
        &self,
        service_name: &str,
        _region: &str,
    ) -> PollOutcome<(), BackendError> {
        let container = match self
            .services
            .read()
            .get(service_name)
            .map(|s| s.container.clone())
        {
            Some(container) => container,
            None => return PollOutcome::NotReadyYet,
        };

        let spec = CommandSpec::new("docker").args([
            "inspect",
            "-f",
            "{{.State.Running}}",
            container.as_str(),
        ]);
        match self.runner.run(spec).await {
            Ok(output) if output.success && output.stdout_trimmed() == "true" => {
                PollOutcome::Ready(())
            }
            Ok(_) => PollOutcome::NotReadyYet,
            Err(err) => PollOutcome::Failed(err),
        }
    }

    async fn service_url(
        &self,
        service_name: &str,
        _region: &str,
    ) -> Result<String, BackendError> {
        let port = self
            .services
            .read()
            .get(service_name)
            .and_then(|s| s.port)
            .ok_or_else(|| BackendError::NotFound(format!("local service {service_name}")))?;
        Ok(format!("http://localhost:{port}"))
    }
}

/// Secret store for local runs; nothing is provisioned.
#[derive(Debug, Default)]
pub struct NoopSecretStore {
    seen: RwLock<HashSet<String>>,
}

impl NoopSecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for NoopSecretStore {
    async fn ensure_secret(
        &self,
        name: &str,
        _content: &str,
    ) -> Result<SecretDisposition, BackendError> {
        debug!(secret = %name, "Skipping secret provisioning for local run");
        if self.seen.write().insert(name.to_string()) {
            Ok(SecretDisposition::Created)
        } else {
            Ok(SecretDisposition::VersionAdded)
        }
    }

    async fn ensure_access(&self, _project_id: &str, _role: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Image publisher for local runs; images are used as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopImagePublisher;

#[async_trait]
impl ImagePublisher for NoopImagePublisher {
    async fn publish(&self, source: &str, _target: &str) -> Result<(), BackendError> {
        debug!(%source, "Skipping image publish for local run");
        Ok(())
    }

    async fn manifest_exists(&self, _image: &str) -> Result<bool, BackendError> {
        Ok(true)
    }
}
