// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple Push Notification service provider.
//!
//! One `POST /3/device/{token}` per send, authenticated with the shared
//! provider token. Rejections are classified into permanent and transient
//! [`DispatchError`]s from the status code and the `reason` field.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use scamguard_config::model::{PushConfig, PushEnvironment};
use scamguard_core::types::{ProviderAck, ProviderToken, PushNotification};
use scamguard_core::{
    AdapterType, DispatchError, HealthStatus, PluginAdapter, PushProvider, ScamguardError,
};

use crate::payload::apns_payload;

pub const SANDBOX_URL: &str = "https://api.sandbox.push.apple.com";
pub const PRODUCTION_URL: &str = "https://api.push.apple.com";

/// Alerts about a message being typed are worthless a minute later.
const ALERT_EXPIRATION_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct ApnsErrorBody {
    reason: String,
}

#[derive(Debug, Clone)]
pub struct ApnsProvider {
    client: reqwest::Client,
    base_url: String,
    topic: String,
}

impl ApnsProvider {
    pub fn new(config: &PushConfig) -> Result<Self, ScamguardError> {
        let topic = config
            .bundle_id
            .clone()
            .ok_or_else(|| ScamguardError::Config("push.bundle_id is required".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ScamguardError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.clone().unwrap_or_else(|| {
            match config.environment {
                PushEnvironment::Sandbox => SANDBOX_URL,
                PushEnvironment::Production => PRODUCTION_URL,
            }
            .to_string()
        });

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            topic,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Maps an APNs rejection onto the dispatch error taxonomy.
fn rejection(status: StatusCode, body: &str) -> DispatchError {
    let reason = serde_json::from_str::<ApnsErrorBody>(body)
        .map(|b| b.reason)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());

    match (status.as_u16(), reason.as_str()) {
        (410, _) | (400, "BadDeviceToken" | "DeviceTokenNotForTopic") => {
            DispatchError::DeviceUnregistered { reason }
        }
        (403, "ExpiredProviderToken") => DispatchError::TokenExpired,
        (code, _) => DispatchError::ProviderRejected {
            status: code,
            permanent: !(code == 429 || status.is_server_error()),
            reason,
        },
    }
}

#[async_trait]
impl PluginAdapter for ApnsProvider {
    fn name(&self) -> &str {
        "apns"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Push
    }

    async fn health_check(&self) -> Result<HealthStatus, ScamguardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ScamguardError> {
        Ok(())
    }
}

#[async_trait]
impl PushProvider for ApnsProvider {
    async fn send(
        &self,
        notification: &PushNotification,
        token: &ProviderToken,
    ) -> Result<ProviderAck, DispatchError> {
        let url = format!("{}/3/device/{}", self.base_url, notification.device_token);
        let expiration = Utc::now().timestamp() + ALERT_EXPIRATION_SECS;

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token.token)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", "10")
            .header("apns-id", &notification.alert_id)
            .header("apns-expiration", expiration.to_string())
            .json(&apns_payload(notification))
            .send()
            .await
            .map_err(|e| DispatchError::NetworkError(format!("APNs request failed: {e}")))?;

        let status = response.status();
        debug!(alert_id = %notification.alert_id, status = %status, "APNs response received");

        if status.is_success() {
            let provider_id = response
                .headers()
                .get("apns-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok(ProviderAck { provider_id });
        }

        let body = response.text().await.unwrap_or_default();
        Err(rejection(status, &body))
    }
}
