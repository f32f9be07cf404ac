//! Secret provisioning via `gcloud secrets`.
//!
//! Secret content is piped to the CLI on stdin (`--data-file=-`), never
//! written to disk and never logged. Log lines identify content by a
//! truncated SHA-256 fingerprint instead.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::backend::command::{CommandRunner, CommandSpec, SystemCommandRunner};
use crate::backend::{SecretDisposition, SecretStore};
use crate::errors::BackendError;

/// Short content fingerprint safe to put in logs and events.
fn content_fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..6])
}

/// Secret store backed by Google Secret Manager.
pub struct GcloudSecretStore {
    runner: Arc<dyn CommandRunner>,
}

impl GcloudSecretStore {
    /// Creates a store using the given runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Store wired to the host `gcloud` binary.
    #[must_use]
    pub fn with_system_runner() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }

    async fn secret_exists(&self, name: &str) -> Result<bool, BackendError> {
        let spec = CommandSpec::new("gcloud").args(["secrets", "describe", name]);
        let output = self.runner.run(spec).await?;
        Ok(output.success)
    }
}

#[async_trait]
impl SecretStore for GcloudSecretStore {
    async fn ensure_secret(
        &self,
        name: &str,
        content: &str,
    ) -> Result<SecretDisposition, BackendError> {
        let fingerprint = content_fingerprint(content);

        if self.secret_exists(name).await? {
            debug!(secret = %name, %fingerprint, "Secret exists, adding new version");
            let spec = CommandSpec::new("gcloud")
                .args(["secrets", "versions", "add", name, "--data-file=-"])
                .with_stdin(content);
            let output = self.runner.run(spec).await?;
            if !output.success {
                return Err(
                    output.into_failure(format!("gcloud secrets versions add {name} failed"))
                );
            }
            Ok(SecretDisposition::VersionAdded)
        } else {
            debug!(secret = %name, %fingerprint, "Creating secret");
            let spec = CommandSpec::new("gcloud")
                .args([
                    "secrets",
                    "create",
                    name,
                    "--data-file=-",
                    "--replication-policy=automatic",
                ])
                .with_stdin(content);
            let output = self.runner.run(spec).await?;
            if !output.success {
                return Err(output.into_failure(format!("gcloud secrets create {name} failed")));
            }
            Ok(SecretDisposition::Created)
        }
    }

    async fn ensure_access(&self, project_id: &str, role: &str) -> Result<(), BackendError> {
        let spec = CommandSpec::new("gcloud").args([
            "auth",
            "list",
            "--filter=status:ACTIVE",
            "--format=value(account)",
        ]);
        let output = self.runner.run(spec).await?;
        if !output.success {
            return Err(output.into_failure("gcloud auth list failed"));
        }
        let account = output.stdout_trimmed().to_string();
        if account.is_empty() {
            return Err(BackendError::NotFound("active gcloud account".to_string()));
        }

        debug!(project = %project_id, %role, "Granting secret access");
        let member_flag = format!("--member=user:{account}");
        let role_flag = format!("--role={role}");
        let spec = CommandSpec::new("gcloud").args([
            "projects",
            "add-iam-policy-binding",
            project_id,
            member_flag.as_str(),
            role_flag.as_str(),
        ]);
        let output = self.runner.run(spec).await?;
        if !output.success {
            return Err(output.into_failure(format!(
                "gcloud projects add-iam-policy-binding {project_id} failed"
            )));
        }
        Ok(())
    }
}
