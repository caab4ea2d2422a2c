// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider credential issuing and caching.
//!
//! [`JwtTokenIssuer`] signs ES256 provider tokens. [`ProviderTokenCache`]
//! shares one token across all dispatches: readers load it lock-free, and
//! refreshes run single-flight behind an async mutex with a double-check.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info, warn};

use scamguard_config::model::PushConfig;
use scamguard_core::types::ProviderToken;
use scamguard_core::{DispatchError, TokenIssuer};

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    iat: i64,
}

/// Signs provider tokens with an EC P-256 key (`alg: ES256`, `kid` = key id).
pub struct JwtTokenIssuer {
    team_id: String,
    key_id: String,
    key: EncodingKey,
    ttl: TimeDelta,
}

impl JwtTokenIssuer {
    /// Builds an issuer from a PKCS#8 PEM private key.
    pub fn from_pem(
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        pem: &[u8],
        ttl: TimeDelta,
    ) -> Result<Self, DispatchError> {
        let key = EncodingKey::from_ec_pem(pem)
            .map_err(|e| DispatchError::Credential(format!("invalid signing key: {e}")))?;
        Ok(Self {
            team_id: team_id.into(),
            key_id: key_id.into(),
            key,
            ttl,
        })
    }

    /// Reads the key file named by `push.private_key_path`.
    pub async fn from_config(config: &PushConfig) -> Result<Self, DispatchError> {
        let (Some(team_id), Some(key_id), Some(path)) = (
            config.team_id.as_deref(),
            config.key_id.as_deref(),
            config.private_key_path.as_deref(),
        ) else {
            return Err(DispatchError::Credential(
                "push.team_id, push.key_id and push.private_key_path are required".into(),
            ));
        };

        let pem = tokio::fs::read(Path::new(path)).await.map_err(|e| {
            DispatchError::Credential(format!("failed to read signing key {path}: {e}"))
        })?;
        let ttl = TimeDelta::seconds(i64::try_from(config.token_ttl_secs).unwrap_or(3600));
        Self::from_pem(team_id, key_id, &pem, ttl)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

#[async_trait]
impl TokenIssuer for JwtTokenIssuer {
    async fn issue(&self) -> Result<ProviderToken, DispatchError> {
        let issued_at = Utc::now();
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = Claims {
            iss: &self.team_id,
            iat: issued_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| DispatchError::Credential(format!("failed to sign provider token: {e}")))?;

        Ok(ProviderToken {
            token,
            issued_at,
            expires_at: issued_at + self.ttl,
        })
    }
}

#[derive(Default)]
struct RefreshState {
    last_failure: Option<(Instant, DispatchError)>,
}

/// Shared provider token with proactive, single-flight refresh.
pub struct ProviderTokenCache {
    issuer: Arc<dyn TokenIssuer>,
    current: ArcSwapOption<ProviderToken>,
    refresh: Mutex<RefreshState>,
    refresh_margin: TimeDelta,
    failure_backoff: Duration,
}

impl ProviderTokenCache {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        refresh_margin: TimeDelta,
        failure_backoff: Duration,
    ) -> Self {
        Self {
            issuer,
            current: ArcSwapOption::empty(),
            refresh: Mutex::new(RefreshState::default()),
            refresh_margin,
            failure_backoff,
        }
    }

    pub fn from_config(issuer: Arc<dyn TokenIssuer>, config: &PushConfig) -> Self {
        Self::new(
            issuer,
            TimeDelta::seconds(i64::try_from(config.refresh_margin_secs).unwrap_or(600)),
            Duration::from_secs(config.refresh_retry_secs),
        )
    }

    /// The cached token, if any, without refreshing.
    pub fn current(&self) -> Option<Arc<ProviderToken>> {
        self.current.load_full()
    }

    /// Returns a token that is not within the refresh margin, refreshing if needed.
    ///
    /// While a refresh is failing, a token that has not yet expired is still
    /// served. Without one, callers get the refresh error, and for
    /// `failure_backoff` after a failure they get it without another signing attempt.
    pub async fn get(&self) -> Result<Arc<ProviderToken>, DispatchError> {
        if let Some(token) = self.fresh() {
            return Ok(token);
        }

        let mut state = self.refresh.lock().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = self.fresh() {
            return Ok(token);
        }

        if let Some((failed_at, err)) = &state.last_failure
            && failed_at.elapsed() < self.failure_backoff
        {
            return self.unexpired().ok_or_else(|| err.clone());
        }

        match self.issuer.issue().await {
            Ok(token) => {
                info!(expires_at = %token.expires_at, "provider token refreshed");
                let token = Arc::new(token);
                self.current.store(Some(Arc::clone(&token)));
                state.last_failure = None;
                #[cfg(feature = "prometheus")]
                scamguard_prometheus::record_token_refresh(true);
                Ok(token)
            }
            Err(e) => {
                error!(error = %e, "provider token refresh failed");
                state.last_failure = Some((Instant::now(), e.clone()));
                #[cfg(feature = "prometheus")]
                scamguard_prometheus::record_token_refresh(false);
                match self.unexpired() {
                    Some(token) => {
                        warn!("serving current provider token until it expires");
                        Ok(token)
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Drops `token` after the provider rejected it as expired.
    ///
    /// A newer token stored by a concurrent refresh is left in place.
    pub fn invalidate(&self, token: &ProviderToken) {
        self.current.rcu(|current| match current {
            Some(cached) if cached.token == token.token => None,
            other => other.clone(),
        });
    }

    fn fresh(&self) -> Option<Arc<ProviderToken>> {
        let now = Utc::now();
        self.current
            .load_full()
            .filter(|t| !t.needs_refresh(now, self.refresh_margin))
    }

    fn unexpired(&self) -> Option<Arc<ProviderToken>> {
        let now = Utc::now();
        self.current.load_full().filter(|t| !t.is_expired(now))
    }
}
