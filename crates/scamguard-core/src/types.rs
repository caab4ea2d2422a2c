// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by every stage of the alert pipeline.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Classifier,
    Storage,
    Push,
    Observability,
}

// --- Ingestion ---

/// A candidate text captured on a device, as received by the ingestion endpoint.
///
/// Immutable once built. The fingerprint is derived from the text at
/// construction so later stages never need to touch `raw_text`.
#[derive(Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub event_id: String,
    pub device_id: String,
    pub user_id: String,
    pub raw_text: String,
    pub captured_at: DateTime<Utc>,
    pub fingerprint: String,
}

impl MessageEvent {
    pub fn new(
        event_id: impl Into<String>,
        device_id: impl Into<String>,
        user_id: impl Into<String>,
        raw_text: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let raw_text = raw_text.into();
        let fingerprint = text_fingerprint(&raw_text);
        Self {
            event_id: event_id.into(),
            device_id: device_id.into(),
            user_id: user_id.into(),
            raw_text,
            captured_at,
            fingerprint,
        }
    }
}

// Message text is user content and must not reach logs.
impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("event_id", &self.event_id)
            .field("device_id", &self.device_id)
            .field("user_id", &self.user_id)
            .field("raw_text", &format_args!("<{} chars>", self.raw_text.chars().count()))
            .field("captured_at", &self.captured_at)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Lowercases, drops punctuation and collapses whitespace runs.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of the normalized text.
///
/// Retyped or lightly corrected messages ("Send $500 NOW!!" vs "send 500 now")
/// produce the same fingerprint.
pub fn text_fingerprint(text: &str) -> String {
    let digest = Sha256::digest(normalize_text(text).as_bytes());
    hex::encode(digest)
}

// --- Classification ---

/// Risk category assigned by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Benign,
    Suspicious,
    Fraud,
}

/// Raw answer from a classifier backend, before range and category checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub risk_score: f64,
    pub risk_category: String,
    #[serde(default)]
    pub model_version: String,
    /// Pattern labels the model matched, e.g. "urgent transfer request".
    #[serde(default)]
    pub detected_patterns: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    /// What the model suggests the user do, e.g. "stop the transfer".
    #[serde(default)]
    pub recommended_action: Option<String>,
}

/// A validated classification of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub event_id: String,
    /// Always within `0.0..=1.0`.
    pub risk_score: f64,
    pub risk_category: RiskCategory,
    pub model_version: String,
    pub detected_patterns: Vec<String>,
    pub explanation: Option<String>,
    pub recommended_action: Option<String>,
    pub latency_ms: u64,
    pub produced_at: DateTime<Utc>,
}

// --- Decision ---

/// Why the decision engine did or did not raise an alert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    ThresholdExceeded,
    CategoryMatched,
    BelowThreshold,
    ManualOverride,
    ClassifierUnavailableFailOpen,
    ClassifierUnavailableFailClosed,
}

/// What to do when the classifier cannot produce a result.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stay quiet: no alert without a classification.
    #[default]
    FailClosed,
    /// Alert anyway and accept the false positive.
    FailOpen,
}

/// Output of the decision engine for one event. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDecision {
    pub event_id: String,
    pub device_id: String,
    pub fingerprint: String,
    pub should_alert: bool,
    pub reason: DecisionReason,
    pub risk_score: Option<f64>,
    pub risk_category: Option<RiskCategory>,
    pub decided_at: DateTime<Utc>,
}

// --- Alert records ---

/// Delivery lifecycle of an alert record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    SuppressedDuplicate,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Durable record of an alert and its delivery attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_id: String,
    pub event_id: String,
    pub device_id: String,
    pub fingerprint: String,
    pub reason: DecisionReason,
    pub risk_category: Option<RiskCategory>,
    pub risk_score: Option<f64>,
    pub delivery_status: DeliveryStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Result of asking the store to record a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// A new record was written. Its status is `pending`, or
    /// `suppressed_duplicate` when the same text already alerted this device
    /// within the duplicate window.
    Created(AlertRecord),
    /// A record for this `event_id` already existed and is returned unchanged.
    Duplicate(AlertRecord),
}

impl RecordOutcome {
    pub fn record(&self) -> &AlertRecord {
        match self {
            Self::Created(r) | Self::Duplicate(r) => r,
        }
    }

    pub fn into_record(self) -> AlertRecord {
        match self {
            Self::Created(r) | Self::Duplicate(r) => r,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Delivery attempt bookkeeping written back to an alert record.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryUpdate {
    pub alert_id: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    /// Time of the last send; unchanged when the update records no send.
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

// --- Push ---

/// Signed push-provider credential shared by all dispatches.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ProviderToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True once `now` is within `margin` of expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A notification addressed to one device. Carries no message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub alert_id: String,
    pub event_id: String,
    pub device_token: String,
    pub title: String,
    pub body: String,
    pub category: Option<RiskCategory>,
}

/// Provider acknowledgement of an accepted notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderAck {
    pub provider_id: Option<String>,
}

/// Final result of dispatching an alert record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub alert_id: String,
    pub event_id: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub provider_id: Option<String>,
}
