//! Backend clients for the deployment platform.
//!
//! This module provides:
//! - The client traits every stage runs against ([`DeploymentBackend`],
//!   [`ImagePublisher`], [`SecretStore`], [`HealthProber`])
//! - Structured subprocess execution ([`CommandSpec`], [`CommandRunner`])
//! - Concrete adapters: Cloud Run via `gcloud`, image publishing via
//!   `docker`, Secret Manager via `gcloud secrets`, HTTP health probing,
//!   and a local Docker flavor for developer machines

mod cloudrun;
mod command;
mod docker;
mod local;
#[cfg(feature = "http-probe")]
mod probe;
mod secrets;
mod traits;
mod types;

pub use cloudrun::GcloudBackend;
#[cfg(test)]
pub use command::MockCommandRunner;
pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use docker::DockerPublisher;
pub use local::{LocalDockerBackend, NoopImagePublisher, NoopSecretStore};
#[cfg(feature = "http-probe")]
pub use probe::HttpProber;
pub use secrets::GcloudSecretStore;
pub use traits::{
    DeploymentBackend, HealthProber, ImagePublisher, SecretDisposition, SecretStore,
};
pub use types::{DeployMode, DeploymentTarget, SecretMount};
