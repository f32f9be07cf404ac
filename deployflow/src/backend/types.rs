//! Deployment target descriptions shared by all backend adapters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a deployment request is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Declare the full service state, creating it or replacing what exists.
    Create,
    /// Merge the target's env vars into the live service, leaving the rest.
    ///
    /// Used for self-referential URL injection, where a service learns its
    /// own public URL only after the first rollout.
    Update,
}

/// A secret mounted into the deployed container as a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMount {
    /// Secret name in the secret store.
    pub secret_name: String,
    /// Version selector, usually `"latest"`.
    pub version: String,
    /// Absolute in-container file path.
    pub mount_path: String,
}

impl SecretMount {
    /// Mounts the latest version of a secret at the given path.
    #[must_use]
    pub fn latest(secret_name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            version: "latest".to_string(),
            mount_path: mount_path.into(),
        }
    }
}

/// Declarative description of one service deployment.
///
/// Built deterministically from the merged stage config: same config in,
/// same target out. Env vars use an ordered map so rendered command lines
/// are stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    /// Platform service name, e.g. `"consumer-node"`.
    pub service_name: String,
    /// Platform region, e.g. `"us-west1"`.
    pub region: String,
    /// Fully qualified container image reference.
    pub image: String,
    /// Environment variables injected into the container.
    pub env_vars: BTreeMap<String, String>,
    /// Secrets mounted as in-container files.
    pub secret_mounts: Vec<SecretMount>,
    /// Container port the service listens on, when the platform needs it.
    pub port: Option<u16>,
}

impl DeploymentTarget {
    /// Creates a target with no env vars, mounts, or port.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        region: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            region: region.into(),
            image: image.into(),
            env_vars: BTreeMap::new(),
            secret_mounts: Vec::new(),
            port: None,
        }
    }

    /// Adds one environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Adds several environment variables.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds a secret file mount.
    #[must_use]
    pub fn with_secret_mount(mut self, mount: SecretMount) -> Self {
        self.secret_mounts.push(mount);
        self
    }

    /// Sets the container port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn target_builder_accumulates() {
        let target = DeploymentTarget::new("consumer-node", "us-west1", "gcr.io/p/consumer:v1")
            .with_env("GO_ENV", "production")
            .with_env_vars([("LOG_LEVEL", "info"), ("LOG_FORMAT", "text")])
            .with_secret_mount(SecretMount::latest("COOKIE_SECRET", "/secrets/.cookie"))
            .with_port(8082);

        assert_eq!(target.service_name, "consumer-node");
        assert_eq!(target.env_vars.len(), 3);
        assert_eq!(target.secret_mounts[0].version, "latest");
        assert_eq!(target.port, Some(8082));
    }

    #[test]
    fn env_vars_iterate_in_key_order() {
        let target = DeploymentTarget::new("proxy-node", "us-west1", "img")
            .with_env("MARKETPLACE_PORT", "3333")
            .with_env("CONSUMER_USERNAME", "admin")
            .with_env("INTERNAL_API_PORT", "8080");

        let keys: Vec<&str> = target.env_vars.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["CONSUMER_USERNAME", "INTERNAL_API_PORT", "MARKETPLACE_PORT"]
        );
    }
}
