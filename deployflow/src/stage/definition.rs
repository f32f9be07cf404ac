//! Declarative catalog of the pipeline's fixed stages.
//!
//! Each deploy stage resolves, together with the merged [`StageConfig`], into
//! an immutable [`StagePlan`]: the image flow, the secret to materialize, the
//! full [`DeploymentTarget`], and the polling policies for rollout and health.
//! Plans are built once per invocation and only read afterwards. Nothing in
//! this module talks to a backend.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{DeployMode, DeploymentTarget, SecretMount};
use crate::context::StageConfig;
use crate::errors::StageError;
use crate::poller::PollPolicy;
use crate::utils::{join_url, valid_service_name};

/// Default rollout and health polling: 30 attempts, 10 seconds apart.
pub const DEFAULT_POLL: PollPolicy = PollPolicy::new(30, Duration::from_secs(10));

/// The web app rolls out quickly, so its rollout wait polls every 2 seconds.
pub const WEBAPP_ROLLOUT_POLL: PollPolicy = PollPolicy::new(30, Duration::from_secs(2));

/// In-container path the consumer's cookie secret is mounted at.
pub const COOKIE_MOUNT_PATH: &str = "/secrets/.cookie";

/// IAM role granted so the deployed service can read its mounted secret.
pub const SECRET_ACCESS_ROLE: &str = "roles/secretmanager.secretAccessor";

/// Identifies one of the fixed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Emits platform settings downstream; makes no external calls.
    Config,
    /// Publishes and deploys the OpenAI-compatible inference proxy.
    Proxy,
    /// Publishes and deploys the marketplace consumer node.
    Consumer,
    /// Deploys the chat web app against the proxy URL.
    Webapp,
}

impl StageKind {
    /// Every stage, in pipeline order.
    pub const ALL: [Self; 4] = [Self::Config, Self::Proxy, Self::Consumer, Self::Webapp];

    /// The stage's wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Proxy => "proxy",
            Self::Consumer => "consumer",
            Self::Webapp => "webapp",
        }
    }

    /// Looks a stage up by its wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "config" => Some(Self::Config),
            "proxy" => Some(Self::Proxy),
            "consumer" => Some(Self::Consumer),
            "webapp" => Some(Self::Webapp),
            _ => None,
        }
    }

    /// True for stages that deploy a service.
    #[must_use]
    pub const fn deploys(self) -> bool {
        !matches!(self, Self::Config)
    }

    /// Action verb reported in results when no plan exists yet.
    #[must_use]
    pub const fn default_action(self) -> &'static str {
        match self {
            Self::Config => "configure",
            Self::Proxy | Self::Consumer | Self::Webapp => "deploy",
        }
    }

    /// Config key the stage publishes its service URL under.
    #[must_use]
    pub const fn url_field(self) -> Option<&'static str> {
        match self {
            Self::Config => None,
            Self::Proxy => Some("proxyUrl"),
            Self::Consumer => Some("consumerUrl"),
            Self::Webapp => Some("webappUrl"),
        }
    }

    /// Platform service name for deploy stages.
    #[must_use]
    pub const fn service_name(self) -> Option<&'static str> {
        match self {
            Self::Config => None,
            Self::Proxy => Some("proxy-node"),
            Self::Consumer => Some("consumer-node"),
            Self::Webapp => Some("chat-web-app"),
        }
    }

    /// Keys that must be present in the merged config before any side
    /// effect is attempted.
    #[must_use]
    pub const fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::Config => &[],
            Self::Proxy => &[
                "projectId",
                "region",
                "dockerRegistry",
                "proxyVersion",
                "consumerUsername",
                "consumerPassword",
            ],
            Self::Consumer => &[
                "projectId",
                "region",
                "dockerRegistry",
                "consumerVersion",
                "consumerUsername",
                "consumerPassword",
            ],
            Self::Webapp => &["projectId", "region", "dockerRegistry"],
        }
    }

    /// Human success line for the stage result.
    #[must_use]
    pub fn success_output(self, action: &str, service_url: &str) -> String {
        match self {
            Self::Config => "Configuration loaded".to_string(),
            Self::Proxy => format!("Deployed proxy node to {service_url}"),
            Self::Consumer => format!("Deployed consumer node to {service_url}"),
            Self::Webapp => {
                if action == "update" {
                    "Web app successfully updated".to_string()
                } else {
                    "Web app successfully deployed".to_string()
                }
            }
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a stage sources its container image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFlow {
    /// Pull from the public registry, retag, and push to the project
    /// registry before deploying.
    Publish {
        /// Public image reference to pull.
        source: String,
        /// Project registry reference to push and deploy.
        target: String,
    },
    /// Deploy the registry image as-is. Existence is checked up front but a
    /// missing manifest only logs a warning.
    Direct {
        /// Image reference deployed without republishing.
        image: String,
    },
}

/// A secret the stage materializes before deploying.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRequirement {
    /// Secret name in the store.
    pub name: String,
    /// Secret payload, handed to the store over stdin and never logged.
    pub content: String,
    /// Where the secret file appears inside the container.
    pub mount_path: String,
}

impl fmt::Debug for SecretRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRequirement")
            .field("name", &self.name)
            .field("content", &"<redacted>")
            .field("mount_path", &self.mount_path)
            .finish()
    }
}

/// How the executor verifies a deployed service's health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthPlan {
    /// Poll until healthy; running out of attempts fails the stage.
    Required(PollPolicy),
    /// Probe once and log a warning on failure; the stage still succeeds.
    Advisory,
}

/// Outcome of resolving a stage against its merged config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedStage {
    /// Every input is present; the executor can run this plan.
    Ready(Box<StagePlan>),
    /// An upstream field has not arrived yet; report pending, touch nothing.
    Hold {
        /// What the stage is waiting for.
        message: String,
    },
}

/// Immutable per-invocation deployment plan.
///
/// Field order mirrors the execution sequence: secret, image, deploy,
/// rollout wait, self-URL follow-up, health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Which stage this plan is for.
    pub kind: StageKind,
    /// Action verb echoed in the stage result.
    pub action: String,
    /// Platform project the stage deploys into.
    pub project_id: String,
    /// Secret to materialize before deploying, if any.
    pub secret: Option<SecretRequirement>,
    /// Image publication flow.
    pub image: ImageFlow,
    /// Full deployment request handed to the backend.
    pub target: DeploymentTarget,
    /// Whether the deploy declares a new service or updates it in place.
    pub mode: DeployMode,
    /// Rollout polling policy.
    pub rollout: PollPolicy,
    /// Health verification policy.
    pub health: HealthPlan,
    /// Env var set to the service's own public URL after the first rollout.
    pub self_url_env: Option<&'static str>,
    /// Config key the service URL is produced under.
    pub url_field: &'static str,
}

impl StagePlan {
    /// Resolves a deploy stage against its merged config.
    ///
    /// The stage's required keys are checked first; nothing past this point
    /// runs with a missing input. The consumer hard-fails without an
    /// upstream proxy URL, the web app holds instead.
    ///
    /// # Errors
    ///
    /// Configuration errors name every missing key. The config stage has no
    /// deployment plan and is rejected here.
    pub fn build(kind: StageKind, config: &StageConfig) -> Result<PlannedStage, StageError> {
        config.require_all(kind.required_keys())?;

        match kind {
            StageKind::Config => Err(StageError::config(
                "config stage does not deploy a service",
            )),
            StageKind::Proxy => proxy_plan(config).map(ready),
            StageKind::Consumer => consumer_plan(config).map(ready),
            StageKind::Webapp => webapp_plan(config),
        }
    }

    /// Validates platform naming rules before any backend call.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the service name breaks the
    /// platform's DNS-label rule.
    pub fn validate(&self) -> Result<(), StageError> {
        if valid_service_name(&self.target.service_name) {
            Ok(())
        } else {
            Err(StageError::config(format!(
                "Invalid service name: {}",
                self.target.service_name
            )))
        }
    }

    /// Human success line for this plan's stage result.
    #[must_use]
    pub fn success_output(&self, service_url: &str) -> String {
        self.kind.success_output(&self.action, service_url)
    }
}

fn ready(plan: StagePlan) -> PlannedStage {
    PlannedStage::Ready(Box::new(plan))
}

/// Platform settings the config stage emits downstream.
///
/// Merged under the upstream config, so explicitly supplied values always
/// win. Project id and credentials have no defaults; they pass through only
/// when the caller provides them.
#[must_use]
pub fn platform_defaults() -> StageConfig {
    StageConfig::new()
        .with("region", "us-west1")
        .with("dockerRegistry", "srt0422")
        .with("proxyVersion", "v0.0.31")
        .with("consumerVersion", "v0.0.19")
        .with("webappVersion", "latest")
        .with("contractAddress", "0xb8C55cD613af947E73E262F0d3C54b7211Af16CF")
        .with("morTokenAddress", "0x34a285a1b1c166420df5b6630132542923b5b27e")
        .with("blockchainHttpUrl", "https://sepolia-rollup.arbitrum.io/rpc")
        .with("explorerApiUrl", "https://api-sepolia.arbiscan.io/api")
        .with("ethNodeChainId", "421614")
        .with("ethNodeLegacyTx", "false")
        .with("ethNodeUseSubscriptions", "false")
        .with("providerCacheTtl", "60")
        .with("maxConcurrentSessions", "100")
        .with("sessionTimeout", "3600")
        .with("logLevel", "info")
        .with("logFormat", "text")
        .with("logColor", "true")
        .with("environment", "development")
        .with("proxyAddress", "0.0.0.0:3333")
        .with("webAddress", "0.0.0.0:8082")
        .with("proxyStoreChatContext", "true")
        .with("proxyStoragePath", "./data/")
        .with("cookieSecretName", "COOKIE_SECRET")
}

fn proxy_plan(config: &StageConfig) -> Result<StagePlan, StageError> {
    let project_id = config.require("projectId")?;
    let region = config.require("region")?;
    let registry = config.require("dockerRegistry")?;
    let version = config.require("proxyVersion")?;

    let source_image = format!("{registry}/openai-morpheus-proxy:{version}");
    let target_image = format!("gcr.io/{project_id}/openai-morpheus-proxy:{version}");

    let target = DeploymentTarget::new("proxy-node", region, target_image.clone())
        .with_env_vars(proxy_env(config)?)
        .with_port(8080);

    Ok(StagePlan {
        kind: StageKind::Proxy,
        action: "deploy".to_string(),
        project_id,
        secret: None,
        image: ImageFlow::Publish {
            source: source_image,
            target: target_image,
        },
        target,
        mode: DeployMode::Create,
        rollout: DEFAULT_POLL,
        health: HealthPlan::Required(DEFAULT_POLL),
        self_url_env: None,
        url_field: "proxyUrl",
    })
}

fn consumer_plan(config: &StageConfig) -> Result<StagePlan, StageError> {
    // The proxy URL gates the consumer even though its env never carries it.
    let proxy_url = config.string_value("proxyUrl").unwrap_or_default();
    if proxy_url.is_empty() {
        return Err(StageError::config(
            "Missing proxy URL. Make sure to run the proxy stage first.",
        ));
    }

    let project_id = config.require("projectId")?;
    let region = config.require("region")?;
    let registry = config.require("dockerRegistry")?;
    let version = config.require("consumerVersion")?;
    let username = config.require("consumerUsername")?;
    let password = config.require("consumerPassword")?;
    let secret_name = config.string_or("cookieSecretName", "COOKIE_SECRET");

    let source_image = format!("{registry}/morpheus-marketplace-consumer:{version}");
    let target_image = format!("gcr.io/{project_id}/morpheus-lumerin-node:{version}");

    let target = DeploymentTarget::new("consumer-node", region, target_image.clone())
        .with_env_vars(consumer_env(config)?)
        .with_secret_mount(SecretMount::latest(secret_name.clone(), COOKIE_MOUNT_PATH))
        .with_port(8082);

    Ok(StagePlan {
        kind: StageKind::Consumer,
        action: "deploy".to_string(),
        project_id,
        secret: Some(SecretRequirement {
            name: secret_name,
            content: format!("{username}:{password}"),
            mount_path: COOKIE_MOUNT_PATH.to_string(),
        }),
        image: ImageFlow::Publish {
            source: source_image,
            target: target_image,
        },
        target,
        mode: DeployMode::Create,
        rollout: DEFAULT_POLL,
        health: HealthPlan::Required(DEFAULT_POLL),
        self_url_env: Some("WEB_PUBLIC_URL"),
        url_field: "consumerUrl",
    })
}

fn webapp_plan(config: &StageConfig) -> Result<PlannedStage, StageError> {
    let proxy_url = config.string_value("proxyUrl").unwrap_or_default();
    if proxy_url.is_empty() {
        return Ok(PlannedStage::Hold {
            message: "Waiting for proxy URL before deploying".to_string(),
        });
    }

    let project_id = config.require("projectId")?;
    let region = config.require("region")?;
    let registry = config.require("dockerRegistry")?;

    // The web app's tag key differs from the one the config stage emits.
    let tag = config
        .string_value("version")
        .or_else(|| config.string_value("webappVersion"))
        .unwrap_or_else(|| "latest".to_string());

    let action = if config.string_or("action", "deploy") == "update" {
        "update"
    } else {
        "deploy"
    };
    let mode = if action == "update" {
        DeployMode::Update
    } else {
        DeployMode::Create
    };

    let image = format!("{registry}/chat-web-app:{tag}");

    let target = DeploymentTarget::new("chat-web-app", region, image.clone())
        .with_env_vars(webapp_env(config, &proxy_url));

    Ok(ready(StagePlan {
        kind: StageKind::Webapp,
        action: action.to_string(),
        project_id,
        secret: None,
        image: ImageFlow::Direct { image },
        target,
        mode,
        rollout: WEBAPP_ROLLOUT_POLL,
        health: HealthPlan::Advisory,
        self_url_env: None,
        url_field: "webappUrl",
    }))
}

fn proxy_env(config: &StageConfig) -> Result<BTreeMap<String, String>, StageError> {
    let mut env = BTreeMap::new();
    env.insert(
        "INTERNAL_API_PORT".to_string(),
        config.string_or("internalApiPort", "8080"),
    );
    env.insert(
        "MARKETPLACE_PORT".to_string(),
        config.string_or("marketplacePort", "3333"),
    );
    env.insert(
        "SESSION_DURATION".to_string(),
        config.string_or("sessionDuration", "1h"),
    );
    env.insert(
        "CONSUMER_USERNAME".to_string(),
        config.require("consumerUsername")?,
    );
    env.insert(
        "CONSUMER_PASSWORD".to_string(),
        config.require("consumerPassword")?,
    );
    Ok(env)
}

fn consumer_env(config: &StageConfig) -> Result<BTreeMap<String, String>, StageError> {
    let blockchain_http = config.string_or("blockchainHttpUrl", "https://sepolia-rollup.arbitrum.io/rpc");
    let explorer_api = config.string_or("explorerApiUrl", "https://api-sepolia.arbiscan.io/api");

    let mut env = BTreeMap::new();
    env.insert(
        "PROXY_ADDRESS".to_string(),
        config.string_or("proxyAddress", "0.0.0.0:3333"),
    );
    env.insert(
        "WEB_ADDRESS".to_string(),
        config.string_or("webAddress", "0.0.0.0:8082"),
    );
    env.insert(
        "WALLET_PRIVATE_KEY".to_string(),
        config.string_or("walletKey", ""),
    );
    env.insert(
        "DIAMOND_CONTRACT_ADDRESS".to_string(),
        config.string_or("contractAddress", "0xb8C55cD613af947E73E262F0d3C54b7211Af16CF"),
    );
    env.insert(
        "MOR_TOKEN_ADDRESS".to_string(),
        config.string_or("morTokenAddress", "0x34a285a1b1c166420df5b6630132542923b5b27e"),
    );
    env.insert("EXPLORER_API_URL".to_string(), explorer_api.clone());
    env.insert(
        "ETH_NODE_CHAIN_ID".to_string(),
        config.string_or("ethNodeChainId", "421614"),
    );
    env.insert(
        "ENVIRONMENT".to_string(),
        config.string_or("environment", "development"),
    );
    env.insert(
        "ETH_NODE_USE_SUBSCRIPTIONS".to_string(),
        config.string_or("ethNodeUseSubscriptions", "false"),
    );
    env.insert("ETH_NODE_ADDRESS".to_string(), blockchain_http.clone());
    env.insert(
        "ETH_NODE_LEGACY_TX".to_string(),
        config.string_or("ethNodeLegacyTx", "false"),
    );
    env.insert(
        "PROXY_STORE_CHAT_CONTEXT".to_string(),
        config.string_or("proxyStoreChatContext", "true"),
    );
    env.insert(
        "PROXY_STORAGE_PATH".to_string(),
        config.string_or("proxyStoragePath", "./data/"),
    );
    env.insert("LOG_COLOR".to_string(), config.string_or("logColor", "true"));
    env.insert("LOG_LEVEL".to_string(), config.string_or("logLevel", "info"));
    env.insert("LOG_FORMAT".to_string(), config.string_or("logFormat", "text"));
    env.insert(
        "PROVIDER_CACHE_TTL".to_string(),
        config.string_or("providerCacheTtl", "60"),
    );
    env.insert(
        "MAX_CONCURRENT_SESSIONS".to_string(),
        config.string_or("maxConcurrentSessions", "100"),
    );
    env.insert(
        "SESSION_TIMEOUT".to_string(),
        config.string_or("sessionTimeout", "3600"),
    );
    env.insert(
        "CONSUMER_USERNAME".to_string(),
        config.require("consumerUsername")?,
    );
    env.insert(
        "CONSUMER_PASSWORD".to_string(),
        config.require("consumerPassword")?,
    );
    env.insert(
        "BLOCKCHAIN_WS_URL".to_string(),
        config.string_or("blockchainWsUrl", ""),
    );
    env.insert("BLOCKCHAIN_HTTP_URL".to_string(), blockchain_http);
    env.insert("BLOCKSCOUT_API_URL".to_string(), explorer_api);
    env.insert("COOKIE_FILE_PATH".to_string(), COOKIE_MOUNT_PATH.to_string());
    env.insert("GO_ENV".to_string(), "production".to_string());
    Ok(env)
}

fn webapp_env(config: &StageConfig, proxy_url: &str) -> BTreeMap<String, String> {
    let chat_path = config.string_or("chatCompletionsPath", "/v1/chat/completions");

    let mut env = BTreeMap::new();
    env.insert("OPENAI_API_URL".to_string(), join_url(proxy_url, "/v1"));
    env.insert("CHAT_COMPLETIONS_PATH".to_string(), chat_path.clone());
    env.insert("NEXT_PUBLIC_CHAT_COMPLETIONS_PATH".to_string(), chat_path);
    env.insert(
        "MODEL_NAME".to_string(),
        config.string_or("modelName", "Default Model"),
    );
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;

    fn deploy_config() -> StageConfig {
        platform_defaults().overlaid_with(
            &StageConfig::new()
                .with("projectId", "morpheus-test-project")
                .with("consumerUsername", "test-admin")
                .with("consumerPassword", "test-password")
                .with("proxyUrl", "https://proxy-x.example"),
        )
    }

    fn built_plan(kind: StageKind, config: &StageConfig) -> StagePlan {
        match StagePlan::build(kind, config) {
            Ok(PlannedStage::Ready(plan)) => *plan,
            other => panic!("expected a ready plan, got {other:?}"),
        }
    }

    #[test]
    fn stage_names_round_trip() {
        for kind in StageKind::ALL {
            assert_eq!(StageKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(StageKind::parse("nope"), None);
    }

    #[test]
    fn platform_defaults_cover_the_tuning_table() {
        let defaults = platform_defaults();

        assert_eq!(defaults.string_value("region").as_deref(), Some("us-west1"));
        assert_eq!(defaults.string_value("dockerRegistry").as_deref(), Some("srt0422"));
        assert_eq!(defaults.string_value("proxyVersion").as_deref(), Some("v0.0.31"));
        assert_eq!(defaults.string_value("consumerVersion").as_deref(), Some("v0.0.19"));
        assert_eq!(defaults.string_value("cookieSecretName").as_deref(), Some("COOKIE_SECRET"));
        assert!(!defaults.contains_key("projectId"));
        assert!(!defaults.contains_key("consumerUsername"));
    }

    #[test]
    fn proxy_plan_publishes_and_deploys_the_proxy_image() {
        let plan = built_plan(StageKind::Proxy, &deploy_config());

        assert_eq!(
            plan.image,
            ImageFlow::Publish {
                source: "srt0422/openai-morpheus-proxy:v0.0.31".to_string(),
                target: "gcr.io/morpheus-test-project/openai-morpheus-proxy:v0.0.31".to_string(),
            }
        );
        assert_eq!(plan.target.service_name, "proxy-node");
        assert_eq!(plan.target.port, Some(8080));
        assert_eq!(plan.target.env_vars["INTERNAL_API_PORT"], "8080");
        assert_eq!(plan.target.env_vars["MARKETPLACE_PORT"], "3333");
        assert_eq!(plan.target.env_vars["SESSION_DURATION"], "1h");
        assert_eq!(plan.target.env_vars["CONSUMER_USERNAME"], "test-admin");
        assert_eq!(plan.url_field, "proxyUrl");
        assert_eq!(plan.secret, None);
        assert_eq!(plan.self_url_env, None);
        assert_eq!(plan.health, HealthPlan::Required(DEFAULT_POLL));
    }

    #[test]
    fn consumer_plan_carries_secret_and_full_env() {
        let plan = built_plan(StageKind::Consumer, &deploy_config());

        let secret = plan.secret.clone().unwrap();
        assert_eq!(secret.name, "COOKIE_SECRET");
        assert_eq!(secret.content, "test-admin:test-password");
        assert_eq!(secret.mount_path, "/secrets/.cookie");

        assert_eq!(
            plan.image,
            ImageFlow::Publish {
                source: "srt0422/morpheus-marketplace-consumer:v0.0.19".to_string(),
                target: "gcr.io/morpheus-test-project/morpheus-lumerin-node:v0.0.19".to_string(),
            }
        );
        assert_eq!(plan.target.service_name, "consumer-node");
        assert_eq!(plan.target.port, Some(8082));
        assert_eq!(plan.target.secret_mounts[0].secret_name, "COOKIE_SECRET");
        assert_eq!(plan.target.secret_mounts[0].mount_path, "/secrets/.cookie");

        assert_eq!(plan.target.env_vars.len(), 26);
        assert_eq!(plan.target.env_vars["GO_ENV"], "production");
        assert_eq!(plan.target.env_vars["COOKIE_FILE_PATH"], "/secrets/.cookie");
        assert_eq!(
            plan.target.env_vars["ETH_NODE_ADDRESS"],
            "https://sepolia-rollup.arbitrum.io/rpc"
        );
        assert_eq!(
            plan.target.env_vars["BLOCKSCOUT_API_URL"],
            "https://api-sepolia.arbiscan.io/api"
        );
        assert_eq!(plan.target.env_vars["WALLET_PRIVATE_KEY"], "");
        assert_eq!(plan.self_url_env, Some("WEB_PUBLIC_URL"));
        assert_eq!(plan.url_field, "consumerUrl");
    }

    #[test]
    fn consumer_secret_name_follows_config() {
        let config = deploy_config().overlaid_with(&StageConfig::new().with("cookieSecretName", "ALT_COOKIE"));
        let plan = built_plan(StageKind::Consumer, &config);

        assert_eq!(plan.secret.unwrap().name, "ALT_COOKIE");
        assert_eq!(plan.target.secret_mounts[0].secret_name, "ALT_COOKIE");
    }

    #[test]
    fn consumer_without_proxy_url_fails_before_any_effect() {
        let config = platform_defaults().overlaid_with(
            &StageConfig::new()
                .with("projectId", "morpheus-test-project")
                .with("consumerUsername", "test-admin")
                .with("consumerPassword", "test-password"),
        );

        let error = match StagePlan::build(StageKind::Consumer, &config) {
            Err(error) => error,
            Ok(planned) => panic!("expected a config error, got {planned:?}"),
        };
        assert_eq!(error.kind, ErrorKind::Config);
        assert_eq!(
            error.message,
            "Missing proxy URL. Make sure to run the proxy stage first."
        );
    }

    #[test]
    fn consumer_treats_empty_proxy_url_as_missing() {
        let config = deploy_config().overlaid_with(&StageConfig::new().with("proxyUrl", ""));

        let error = StagePlan::build(StageKind::Consumer, &config).unwrap_err();
        assert!(error.message.contains("Missing proxy URL"));
    }

    #[test]
    fn webapp_without_proxy_url_holds() {
        let config = StageConfig::new()
            .with("projectId", "p")
            .with("region", "us-west1")
            .with("dockerRegistry", "srt0422");

        match StagePlan::build(StageKind::Webapp, &config) {
            Ok(PlannedStage::Hold { message }) => {
                assert_eq!(message, "Waiting for proxy URL before deploying");
            }
            other => panic!("expected a hold, got {other:?}"),
        }
    }

    #[test]
    fn webapp_env_joins_proxy_url_without_doubled_slash() {
        let config = deploy_config().overlaid_with(&StageConfig::new().with("proxyUrl", "https://proxy-x.example/"));
        let plan = built_plan(StageKind::Webapp, &config);

        assert_eq!(
            plan.target.env_vars["OPENAI_API_URL"],
            "https://proxy-x.example/v1"
        );
        assert_eq!(
            plan.target.env_vars["CHAT_COMPLETIONS_PATH"],
            "/v1/chat/completions"
        );
        assert_eq!(
            plan.target.env_vars["NEXT_PUBLIC_CHAT_COMPLETIONS_PATH"],
            "/v1/chat/completions"
        );
        assert_eq!(plan.target.env_vars["MODEL_NAME"], "Default Model");
        assert_eq!(plan.target.port, None);
    }

    #[test]
    fn webapp_tag_falls_back_to_webapp_version() {
        let plan = built_plan(StageKind::Webapp, &deploy_config());
        assert_eq!(plan.image, ImageFlow::Direct { image: "srt0422/chat-web-app:latest".to_string() });

        let pinned = deploy_config().overlaid_with(&StageConfig::new().with("version", "v2.1.0"));
        let plan = built_plan(StageKind::Webapp, &pinned);
        assert_eq!(plan.image, ImageFlow::Direct { image: "srt0422/chat-web-app:v2.1.0".to_string() });
    }

    #[test]
    fn webapp_update_action_switches_mode_and_output() {
        let config = deploy_config().overlaid_with(&StageConfig::new().with("action", "update"));
        let plan = built_plan(StageKind::Webapp, &config);

        assert_eq!(plan.action, "update");
        assert_eq!(plan.mode, DeployMode::Update);
        assert_eq!(plan.rollout, WEBAPP_ROLLOUT_POLL);
        assert_eq!(plan.health, HealthPlan::Advisory);
        assert_eq!(plan.success_output("https://web.example"), "Web app successfully updated");
    }

    #[test]
    fn missing_required_keys_are_all_named() {
        let config = StageConfig::new().with("projectId", "p");

        let error = StagePlan::build(StageKind::Proxy, &config).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Config);
        assert!(error.message.starts_with("Missing required configuration:"));
        assert!(error.message.contains("region"));
        assert!(error.message.contains("proxyVersion"));
        assert!(!error.message.contains("projectId"));
    }

    #[test]
    fn config_stage_has_no_deploy_plan() {
        let error = StagePlan::build(StageKind::Config, &deploy_config()).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Config);
    }

    #[test]
    fn validate_rejects_bad_service_names() {
        let mut plan = built_plan(StageKind::Proxy, &deploy_config());
        assert!(plan.validate().is_ok());

        plan.target.service_name = "Proxy_Node".to_string();
        let error = plan.validate().unwrap_err();
        assert!(error.message.contains("Invalid service name"));
    }

    #[test]
    fn secret_requirement_debug_never_prints_content() {
        let secret = SecretRequirement {
            name: "COOKIE_SECRET".to_string(),
            content: "admin:hunter2".to_string(),
            mount_path: "/secrets/.cookie".to_string(),
        };

        let rendered = format!("{secret:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn success_outputs_match_per_stage() {
        assert_eq!(
            StageKind::Consumer.success_output("deploy", "https://c.example"),
            "Deployed consumer node to https://c.example"
        );
        assert_eq!(
            StageKind::Proxy.success_output("deploy", "https://p.example"),
            "Deployed proxy node to https://p.example"
        );
        assert_eq!(
            StageKind::Webapp.success_output("deploy", "https://w.example"),
            "Web app successfully deployed"
        );
        assert_eq!(StageKind::Config.success_output("configure", ""), "Configuration loaded");
    }
}
