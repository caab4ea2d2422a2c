// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording push provider and counting token issuer.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::Mutex;

use scamguard_core::types::{ProviderAck, ProviderToken, PushNotification};
use scamguard_core::{
    AdapterType, DispatchError, HealthStatus, PluginAdapter, PushProvider, ScamguardError,
    TokenIssuer,
};

/// A notification the mock provider accepted, with the credential it was sent under.
#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub notification: PushNotification,
    pub provider_token: String,
}

/// A push provider that records accepted notifications.
///
/// Each send consumes the next scripted result, falling back to the default.
/// Sends authenticated with an expired provider token are rejected with
/// [`DispatchError::TokenExpired`] before the script is consulted.
pub struct MockPushProvider {
    script: Mutex<VecDeque<Result<(), DispatchError>>>,
    default: Result<(), DispatchError>,
    expired_tokens: Mutex<HashSet<String>>,
    sent: Mutex<Vec<SentPush>>,
    attempts: AtomicUsize,
    delay: Duration,
}

impl MockPushProvider {
    /// Accepts every notification.
    pub fn new() -> Self {
        Self::with_default(Ok(()))
    }

    /// Rejects every notification with `error`.
    pub fn failing(error: DispatchError) -> Self {
        Self::with_default(Err(error))
    }

    fn with_default(default: Result<(), DispatchError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default,
            expired_tokens: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_script(mut self, script: Vec<Result<(), DispatchError>>) -> Self {
        self.script = Mutex::new(script.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Treat `token` as expired from now on.
    pub async fn expire_token(&self, token: &str) {
        self.expired_tokens.lock().await.insert(token.to_string());
    }

    /// Sends attempted, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Notifications accepted so far.
    pub async fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().await.clone()
    }
}

impl Default for MockPushProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPushProvider {
    fn name(&self) -> &str {
        "mock-push"
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
impl PushProvider for MockPushProvider {
    async fn send(
        &self,
        notification: &PushNotification,
        token: &ProviderToken,
    ) -> Result<ProviderAck, DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.expired_tokens.lock().await.contains(&token.token) {
            return Err(DispatchError::TokenExpired);
        }

        let result = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        result?;

        self.sent.lock().await.push(SentPush {
            notification: notification.clone(),
            provider_token: token.token.clone(),
        });
        Ok(ProviderAck {
            provider_id: Some(notification.alert_id.clone()),
        })
    }
}

/// Issues `token-1`, `token-2`, ... and counts how often it was asked.
pub struct CountingTokenIssuer {
    issued: AtomicUsize,
    ttl: TimeDelta,
    delay: Duration,
    failing: AtomicBool,
}

impl CountingTokenIssuer {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            ttl,
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
        }
    }

    /// Signing latency, to widen refresh races.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// While set, every issue fails with a credential error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Issue attempts, successful or not.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl Default for CountingTokenIssuer {
    fn default() -> Self {
        Self::new(TimeDelta::hours(1))
    }
}

#[async_trait]
impl TokenIssuer for CountingTokenIssuer {
    async fn issue(&self) -> Result<ProviderToken, DispatchError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Credential("signing key rejected".into()));
        }
        let now = Utc::now();
        Ok(ProviderToken {
            token: format!("token-{n}"),
            issued_at: now,
            expires_at: now + self.ttl,
        })
    }
}
