// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Scamguard pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! startup instead of silently falling back to a default.

use scamguard_core::types::{FailureMode, RiskCategory};
use serde::{Deserialize, Serialize};

/// Top-level Scamguard configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with `SCAMGUARD_*`
/// environment overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScamguardConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Ingestion HTTP endpoint.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Classifier backend, retry and circuit-breaker settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Alert decision policy.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Per-device duplicate and rate limiting.
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Push provider credentials and delivery retries.
    #[serde(default)]
    pub push: PushConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Instance name, reported by `/health`.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds to wait for in-flight events on shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_service_name() -> String {
    "scamguard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_drain_timeout_secs() -> u64 {
    30
}

/// How `POST /v1/events` answers the keyboard client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Return 202 at once; processing continues detached from the request.
    #[default]
    Accepted,
    /// Wait for the alert decision (bounded by `decision_timeout_ms`).
    Decision,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Decision => "decision",
        }
    }
}

/// Ingestion endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. Without one every API call is rejected.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Response mode for event submission.
    #[serde(default)]
    pub response_mode: ResponseMode,

    /// Upper bound on submitted text length, in characters.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// How long `decision` mode waits before answering `pending`.
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            response_mode: ResponseMode::default(),
            max_text_chars: default_max_text_chars(),
            decision_timeout_ms: default_decision_timeout_ms(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_max_text_chars() -> usize {
    4096
}

fn default_decision_timeout_ms() -> u64 {
    10_000
}

/// Wire protocol spoken by the classifier backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Scoring service that answers with the verdict as a JSON body.
    #[default]
    Http,
    /// Ollama `/api/generate`; the verdict is JSON inside the generated text.
    Ollama,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Ollama => "ollama",
        }
    }
}

/// Classifier client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Backend protocol.
    #[serde(default)]
    pub backend: ClassifierKind,

    /// Inference endpoint URL. For `ollama`, the server base URL.
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint_url: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Optional API key, sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Screening instructions sent with each request. Built-in template when unset.
    #[serde(default)]
    pub prompt: Option<String>,

    /// Deadline for one inference attempt.
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt for timeouts and unavailability.
    #[serde(default = "default_classifier_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_classifier_backoff_ms")]
    pub backoff_base_ms: u64,

    /// Consecutive failures that open the circuit breaker.
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,

    /// Rolling window the consecutive failures must fall in.
    #[serde(default = "default_breaker_window_secs")]
    pub breaker_window_secs: u64,

    /// How long the breaker stays open before admitting a trial call.
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierKind::default(),
            endpoint_url: default_classifier_endpoint(),
            model: default_classifier_model(),
            api_key: None,
            prompt: None,
            timeout_ms: default_classifier_timeout_ms(),
            max_retries: default_classifier_max_retries(),
            backoff_base_ms: default_classifier_backoff_ms(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_window_secs: default_breaker_window_secs(),
            breaker_cooldown_secs: default_breaker_cooldown_secs(),
        }
    }
}

fn default_classifier_endpoint() -> String {
    "http://127.0.0.1:8080/v1/classify".to_string()
}

fn default_classifier_model() -> String {
    "fraud-screen-v1".to_string()
}

fn default_classifier_timeout_ms() -> u64 {
    3000
}

fn default_classifier_max_retries() -> u32 {
    2
}

fn default_classifier_backoff_ms() -> u64 {
    200
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_window_secs() -> u64 {
    60
}

fn default_breaker_cooldown_secs() -> u64 {
    30
}

/// Alert decision policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Alert when the risk score is at or above this value.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Categories that alert regardless of score.
    #[serde(default = "default_alert_categories")]
    pub alert_categories: Vec<RiskCategory>,

    /// Behaviour when the classifier is unavailable after retries.
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Operator switch that forces every decision to this value.
    #[serde(default)]
    pub manual_override: Option<bool>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            alert_categories: default_alert_categories(),
            failure_mode: FailureMode::default(),
            manual_override: None,
        }
    }
}

fn default_threshold() -> f64 {
    0.75
}

fn default_alert_categories() -> Vec<RiskCategory> {
    vec![RiskCategory::Fraud]
}

/// Debounce cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebounceConfig {
    /// Sliding window for duplicate suppression and rate limiting.
    #[serde(default = "default_debounce_window_secs")]
    pub window_secs: u64,

    /// Devices tracked before the least recently used one is evicted.
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,

    /// Admissions allowed per device per window.
    #[serde(default = "default_max_per_window")]
    pub max_per_window: usize,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window_secs: default_debounce_window_secs(),
            max_devices: default_max_devices(),
            max_per_window: default_max_per_window(),
        }
    }
}

fn default_debounce_window_secs() -> u64 {
    30
}

fn default_max_devices() -> usize {
    10_000
}

fn default_max_per_window() -> usize {
    20
}

/// APNs endpoint selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushEnvironment {
    #[default]
    Sandbox,
    Production,
}

/// Push dispatcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    /// Sandbox or production gateway.
    #[serde(default)]
    pub environment: PushEnvironment,

    /// Overrides the provider host (used for local relays).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Developer team identifier, the `iss` claim of the provider token.
    #[serde(default)]
    pub team_id: Option<String>,

    /// Signing key identifier, the `kid` header of the provider token.
    #[serde(default)]
    pub key_id: Option<String>,

    /// Path to the PKCS#8 PEM signing key.
    #[serde(default)]
    pub private_key_path: Option<String>,

    /// App bundle identifier, sent as `apns-topic`.
    #[serde(default)]
    pub bundle_id: Option<String>,

    /// Total delivery attempts per alert.
    #[serde(default = "default_attempt_cap")]
    pub attempt_cap: u32,

    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_push_backoff_ms")]
    pub backoff_base_ms: u64,

    /// Validity of a freshly signed provider token.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Refresh the token this long before it expires.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,

    /// After a failed refresh, further refreshes fail fast for this long.
    #[serde(default = "default_refresh_retry_secs")]
    pub refresh_retry_secs: u64,

    /// HTTP request timeout for one push attempt.
    #[serde(default = "default_push_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            environment: PushEnvironment::default(),
            base_url: None,
            team_id: None,
            key_id: None,
            private_key_path: None,
            bundle_id: None,
            attempt_cap: default_attempt_cap(),
            backoff_base_ms: default_push_backoff_ms(),
            token_ttl_secs: default_token_ttl_secs(),
            refresh_margin_secs: default_refresh_margin_secs(),
            refresh_retry_secs: default_refresh_retry_secs(),
            request_timeout_ms: default_push_timeout_ms(),
        }
    }
}

fn default_attempt_cap() -> u32 {
    3
}

fn default_push_backoff_ms() -> u64 {
    500
}

fn default_token_ttl_secs() -> u64 {
    3600
}

fn default_refresh_margin_secs() -> u64 {
    600
}

fn default_refresh_retry_secs() -> u64 {
    5
}

fn default_push_timeout_ms() -> u64 {
    10_000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Repeat alerts for the same text on the same device within this window
    /// are stored as `suppressed_duplicate` and never dispatched.
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            duplicate_window_secs: default_duplicate_window_secs(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("scamguard").join("scamguard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("scamguard.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_duplicate_window_secs() -> u64 {
    300
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
