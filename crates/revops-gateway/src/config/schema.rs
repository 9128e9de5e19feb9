//! Configuration schema (spec §6 "Configuration (enumerated)").

use std::collections::HashMap;

use revops_core::delivery::RetryPolicy;
use revops_core::model::IntentClass;
use serde::{Deserialize, Serialize};

/// Reason recorded when no delivery target is configured for an intent
/// class (spec §6: unset routes map to dead-letter with this reason).
pub const NO_TARGET_CONFIGURED: &str = "no_target_configured";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Queue configuration.
    #[serde(default)]
    pub queues: QueueConfig,

    /// Agent-runtime addressing.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Chat-platform credentials and endpoint.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Object-store destination.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,

    /// Outbound delivery configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// HTTP server bind address.
    #[serde(default)]
    pub server: ServerConfig,
}

/// The three queue URLs (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Ingress queue: `WorkItem`s awaiting C3.
    #[serde(default)]
    pub url_primary: Option<String>,
    /// Delivery queue: `DeliveryJob`s awaiting C5, including retries.
    #[serde(default)]
    pub url_delivery: Option<String>,
    /// Terminal-failure sink.
    #[serde(default)]
    pub url_deadletter: Option<String>,
}

/// Agent-runtime addressing (spec §6 `agent_id`, `agent_alias_id`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// The agent identifier addressed by the runtime protocol.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// The agent alias/version identifier.
    #[serde(default)]
    pub agent_alias_id: Option<String>,
    /// Base URL of the agent-runtime HTTP endpoint.
    #[serde(default)]
    pub runtime_base_url: Option<String>,
}

/// Chat-platform credentials (spec §6 `signing_secret`, `bot_token`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// HMAC signing secret for verifying inbound chat events.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Bot token used to post/update messages.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Base URL of the chat platform's API.
    #[serde(default = "default_chat_api_base")]
    pub api_base: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            bot_token: None,
            api_base: default_chat_api_base(),
        }
    }
}

fn default_chat_api_base() -> String {
    "https://slack.com/api".to_owned()
}

/// Object-store destination (spec §6 `object_store_bucket`,
/// `object_store_prefix`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Target bucket name.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key prefix prepended ahead of `conversation-history/...`.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Outbound delivery configuration (spec §6 `delivery_targets`,
/// `delivery_retry`, `progress_throttle_ms`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// `{intent_class → target URL}`, keyed by [`IntentClass::as_str`].
    /// An unset class routes to dead-letter with reason
    /// [`NO_TARGET_CONFIGURED`].
    #[serde(default)]
    pub targets: HashMap<String, String>,
    /// Retry/backoff policy.
    #[serde(default)]
    pub retry: RetryPolicyConfig,
    /// Minimum interval between chat progress updates, in milliseconds.
    #[serde(default = "default_progress_throttle_ms")]
    pub progress_throttle_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            targets: HashMap::new(),
            retry: RetryPolicyConfig::default(),
            progress_throttle_ms: default_progress_throttle_ms(),
        }
    }
}

const fn default_progress_throttle_ms() -> u64 {
    2000
}

impl DeliveryConfig {
    /// Resolve the configured target URL for `intent_class`, or `None`
    /// if it must be routed to dead-letter with
    /// [`NO_TARGET_CONFIGURED`].
    #[must_use]
    pub fn target_for(&self, intent_class: IntentClass) -> Option<&str> {
        self.targets.get(intent_class.as_str()).map(String::as_str)
    }
}

/// TOML-serializable mirror of [`RetryPolicy`] (spec §6 `delivery_retry`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Base delay in seconds.
    #[serde(default = "default_base_secs")]
    pub base_secs: u64,
    /// Exponential multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Cap in seconds.
    #[serde(default = "default_cap_secs")]
    pub cap_secs: u64,
    /// Maximum attempts before permanent failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Uniform jitter fraction.
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

const fn default_base_secs() -> u64 {
    1
}
const fn default_multiplier() -> f64 {
    2.0
}
const fn default_cap_secs() -> u64 {
    300
}
const fn default_max_attempts() -> u32 {
    5
}
const fn default_jitter_fraction() -> f64 {
    0.1
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            base_secs: default_base_secs(),
            multiplier: default_multiplier(),
            cap_secs: default_cap_secs(),
            max_attempts: default_max_attempts(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

impl From<RetryPolicyConfig> for RetryPolicy {
    fn from(config: RetryPolicyConfig) -> Self {
        Self {
            base: std::time::Duration::from_secs(config.base_secs),
            multiplier: config.multiplier,
            cap: std::time::Duration::from_secs(config.cap_secs),
            max_attempts: config.max_attempts,
            jitter_fraction: config.jitter_fraction,
        }
    }
}

/// HTTP server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_owned()
}

impl GatewayConfig {
    /// Validate the configuration and return any issues found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.queues.url_primary.is_none() {
            issues.push(ConfigIssue::error("queues.url_primary", "ingress queue URL is required"));
        }
        if self.queues.url_delivery.is_none() {
            issues.push(ConfigIssue::error("queues.url_delivery", "delivery queue URL is required"));
        }
        if self.queues.url_deadletter.is_none() {
            issues.push(ConfigIssue::error(
                "queues.url_deadletter",
                "dead-letter queue URL is required",
            ));
        }
        if self.chat.signing_secret.is_none() {
            issues.push(ConfigIssue::warning(
                "chat.signing_secret",
                "no signing secret configured; chat ingress will reject all requests",
            ));
        }
        if self.object_store.bucket.is_none() {
            issues.push(ConfigIssue::error("object_store.bucket", "object store bucket is required"));
        }
        if self.delivery.retry.max_attempts == 0 {
            issues.push(ConfigIssue::error(
                "delivery.retry.max_attempts",
                "max_attempts must be at least 1",
            ));
        }

        issues
    }

    /// Whether the configuration has no error-level issues.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().iter().all(|issue| issue.level != IssueLevel::Error)
    }

    /// Merge environment variables into the configuration, the same way
    /// `machi-bot`'s `BotConfig::with_env` layers secrets over a loaded
    /// file (never the other way around).
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if self.chat.signing_secret.is_none()
            && let Ok(secret) = std::env::var("REVOPS_SIGNING_SECRET")
        {
            self.chat.signing_secret = Some(secret);
        }
        if self.chat.bot_token.is_none()
            && let Ok(token) = std::env::var("REVOPS_BOT_TOKEN")
        {
            self.chat.bot_token = Some(token);
        }
        self
    }
}

/// Configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    /// Severity level.
    pub level: IssueLevel,
    /// Configuration path (e.g., `chat.signing_secret`).
    pub path: String,
    /// Human-readable message.
    pub message: String,
}

impl ConfigIssue {
    /// Construct an error-level issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Construct a warning-level issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            IssueLevel::Error => "ERROR",
            IssueLevel::Warning => "WARN",
        };
        write!(f, "[{prefix}] {}: {}", self.path, self.message)
    }
}

/// Severity level for configuration issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// Prevents the gateway from running correctly.
    Error,
    /// Non-fatal; surfaced for operator awareness.
    Warning,
}
