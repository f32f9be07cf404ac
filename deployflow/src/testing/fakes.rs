//! Recording fakes for the backend seams.
//!
//! Hand-rolled doubles with call recording and small scripting hooks, for
//! tests that assert side-effect counts and payloads across a whole stage
//! or pipeline run. Scripted answers are consumed front to back; once a
//! script runs out the fake settles on its steady-state answer.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

use crate::backend::{
    DeployMode, DeploymentBackend, DeploymentTarget, HealthProber, ImagePublisher,
    SecretDisposition, SecretStore,
};
use crate::errors::BackendError;
use crate::poller::PollOutcome;

/// One scripted poll answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedPoll {
    /// Report ready.
    Ready,
    /// Report not ready yet.
    NotReadyYet,
    /// Fail the poll hard with this message.
    Fail(String),
}

impl ScriptedPoll {
    fn into_outcome(self) -> PollOutcome<(), BackendError> {
        match self {
            Self::Ready => PollOutcome::Ready(()),
            Self::NotReadyYet => PollOutcome::NotReadyYet,
            Self::Fail(message) => PollOutcome::Failed(BackendError::command(message, "", "")),
        }
    }
}

/// In-memory deployment backend that records every request.
///
/// Rollout answers follow the status script and default to ready once the
/// script is exhausted. Service URLs derive from the service name unless
/// overridden, so assertions stay deterministic.
#[derive(Debug, Default)]
pub struct FakeBackend {
    deploys: Mutex<Vec<(DeploymentTarget, DeployMode)>>,
    deploy_error: Mutex<Option<String>>,
    status_script: Mutex<VecDeque<ScriptedPoll>>,
    status_calls: Mutex<usize>,
    url_override: Mutex<Option<String>>,
    url_missing: Mutex<bool>,
}

impl FakeBackend {
    /// Creates a backend that accepts everything and is immediately ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent deploy fail with this message.
    pub fn fail_deploys(&self, message: impl Into<String>) {
        *self.deploy_error.lock() = Some(message.into());
    }

    /// Queues rollout status answers, one consumed per describe call.
    pub fn script_statuses(&self, script: impl IntoIterator<Item = ScriptedPoll>) {
        self.status_script.lock().extend(script);
    }

    /// Overrides the URL returned after rollout.
    pub fn set_service_url(&self, url: impl Into<String>) {
        *self.url_override.lock() = Some(url.into());
    }

    /// Makes URL lookups report the service as missing.
    pub fn clear_service_url(&self) {
        *self.url_missing.lock() = true;
    }

    /// Every deploy request, in order.
    #[must_use]
    pub fn deploys(&self) -> Vec<(DeploymentTarget, DeployMode)> {
        self.deploys.lock().clone()
    }

    /// Number of deploy requests.
    #[must_use]
    pub fn deploy_count(&self) -> usize {
        self.deploys.lock().len()
    }

    /// Number of readiness checks.
    #[must_use]
    pub fn status_call_count(&self) -> usize {
        *self.status_calls.lock()
    }
}

#[async_trait]
impl DeploymentBackend for FakeBackend {
    async fn deploy(
        &self,
        target: &DeploymentTarget,
        mode: DeployMode,
    ) -> Result<(), BackendError> {
        self.deploys.lock().push((target.clone(), mode));
        match self.deploy_error.lock().clone() {
            Some(message) => Err(BackendError::command(message, "", "deploy rejected")),
            None => Ok(()),
        }
    }

    async fn describe_status(
        &self,
        _service_name: &str,
        _region: &str,
    ) -> PollOutcome<(), BackendError> {
        *self.status_calls.lock() += 1;
        self.status_script
            .lock()
            .pop_front()
            .map_or(PollOutcome::Ready(()), ScriptedPoll::into_outcome)
    }

    async fn service_url(
        &self,
        service_name: &str,
        _region: &str,
    ) -> Result<String, BackendError> {
        if *self.url_missing.lock() {
            return Err(BackendError::NotFound(format!(
                "URL for service {service_name}"
            )));
        }
        match self.url_override.lock().clone() {
            Some(url) => Ok(url),
            None => Ok(format!("https://{service_name}.example.test")),
        }
    }
}

/// Image publisher that records publishes and manifest probes.
#[derive(Debug)]
pub struct FakePublisher {
    publishes: Mutex<Vec<(String, String)>>,
    manifest_checks: Mutex<Vec<String>>,
    manifest_present: Mutex<bool>,
    publish_error: Mutex<Option<String>>,
}

impl Default for FakePublisher {
    fn default() -> Self {
        Self {
            publishes: Mutex::new(Vec::new()),
            manifest_checks: Mutex::new(Vec::new()),
            manifest_present: Mutex::new(true),
            publish_error: Mutex::new(None),
        }
    }
}

impl FakePublisher {
    /// Creates a publisher where every publish succeeds and every manifest
    /// exists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail with this message.
    pub fn fail_publishes(&self, message: impl Into<String>) {
        *self.publish_error.lock() = Some(message.into());
    }

    /// Controls the manifest probe answer.
    pub fn set_manifest_present(&self, present: bool) {
        *self.manifest_present.lock() = present;
    }

    /// Every `(source, target)` publish request, in order.
    #[must_use]
    pub fn publishes(&self) -> Vec<(String, String)> {
        self.publishes.lock().clone()
    }

    /// Number of publish requests.
    #[must_use]
    pub fn publish_count(&self) -> usize {
        self.publishes.lock().len()
    }

    /// Every image reference probed for a manifest.
    #[must_use]
    pub fn manifest_checks(&self) -> Vec<String> {
        self.manifest_checks.lock().clone()
    }
}

#[async_trait]
impl ImagePublisher for FakePublisher {
    async fn publish(&self, source: &str, target: &str) -> Result<(), BackendError> {
        self.publishes
            .lock()
            .push((source.to_string(), target.to_string()));
        match self.publish_error.lock().clone() {
            Some(message) => Err(BackendError::command(message, "", "")),
            None => Ok(()),
        }
    }

    async fn manifest_exists(&self, image: &str) -> Result<bool, BackendError> {
        self.manifest_checks.lock().push(image.to_string());
        Ok(*self.manifest_present.lock())
    }
}

/// Secret store that records ensures and access grants.
///
/// The first ensure of a name reports `Created`; later ensures of the same
/// name report `VersionAdded`, mirroring the real store's idempotency.
#[derive(Debug, Default)]
pub struct FakeSecrets {
    ensured: Mutex<Vec<(String, String)>>,
    grants: Mutex<Vec<(String, String)>>,
    known: Mutex<HashSet<String>>,
    store_error: Mutex<Option<String>>,
}

impl FakeSecrets {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent store call fail with this message.
    pub fn fail_calls(&self, message: impl Into<String>) {
        *self.store_error.lock() = Some(message.into());
    }

    /// Every `(name, content)` ensure request, in order.
    #[must_use]
    pub fn ensured(&self) -> Vec<(String, String)> {
        self.ensured.lock().clone()
    }

    /// Number of ensure requests.
    #[must_use]
    pub fn ensure_count(&self) -> usize {
        self.ensured.lock().len()
    }

    /// Every `(project, role)` access grant, in order.
    #[must_use]
    pub fn grants(&self) -> Vec<(String, String)> {
        self.grants.lock().clone()
    }
}

#[async_trait]
impl SecretStore for FakeSecrets {
    async fn ensure_secret(
        &self,
        name: &str,
        content: &str,
    ) -> Result<SecretDisposition, BackendError> {
        if let Some(message) = self.store_error.lock().clone() {
            return Err(BackendError::command(message, "", ""));
        }
        self.ensured
            .lock()
            .push((name.to_string(), content.to_string()));
        if self.known.lock().insert(name.to_string()) {
            Ok(SecretDisposition::Created)
        } else {
            Ok(SecretDisposition::VersionAdded)
        }
    }

    async fn ensure_access(&self, project_id: &str, role: &str) -> Result<(), BackendError> {
        if let Some(message) = self.store_error.lock().clone() {
            return Err(BackendError::command(message, "", ""));
        }
        self.grants
            .lock()
            .push((project_id.to_string(), role.to_string()));
        Ok(())
    }
}

/// Health prober that records probed URLs and follows a script.
#[derive(Debug, Default)]
pub struct FakeProber {
    script: Mutex<VecDeque<ScriptedPoll>>,
    probed: Mutex<Vec<String>>,
}

impl FakeProber {
    /// Creates a prober that always reports healthy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues probe answers, one consumed per probe.
    pub fn script(&self, script: impl IntoIterator<Item = ScriptedPoll>) {
        self.script.lock().extend(script);
    }

    /// Every probed URL, in order.
    #[must_use]
    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().clone()
    }

    /// Number of probes.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probed.lock().len()
    }
}

#[async_trait]
impl HealthProber for FakeProber {
    async fn probe(&self, url: &str) -> PollOutcome<(), BackendError> {
        self.probed.lock().push(url.to_string());
        self.script
            .lock()
            .pop_front()
            .map_or(PollOutcome::Ready(()), ScriptedPoll::into_outcome)
    }
}
