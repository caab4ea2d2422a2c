// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde cannot express.
//!
//! All problems are collected so the operator sees every mistake at once.

use crate::diagnostic::ConfigError;
use crate::model::ScamguardConfig;

/// Validate a deserialized configuration.
pub fn validate_config(config: &ScamguardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.gateway.host.trim().is_empty() {
        fail("gateway.host must not be empty".to_string());
    }
    if config.gateway.max_text_chars == 0 {
        fail("gateway.max_text_chars must be greater than 0".to_string());
    }
    if let Some(token) = &config.gateway.bearer_token
        && token.trim().is_empty()
    {
        fail("gateway.bearer_token must not be blank when set".to_string());
    }

    let classifier = &config.classifier;
    if !classifier.endpoint_url.starts_with("http://")
        && !classifier.endpoint_url.starts_with("https://")
    {
        fail(format!(
            "classifier.endpoint_url must be an http(s) URL, got `{}`",
            classifier.endpoint_url
        ));
    }
    if classifier.timeout_ms == 0 {
        fail("classifier.timeout_ms must be greater than 0".to_string());
    }
    if classifier.breaker_failure_threshold == 0 {
        fail("classifier.breaker_failure_threshold must be at least 1".to_string());
    }
    if classifier.breaker_window_secs == 0 {
        fail("classifier.breaker_window_secs must be greater than 0".to_string());
    }

    let threshold = config.policy.threshold;
    if !(0.0..=1.0).contains(&threshold) {
        fail(format!(
            "policy.threshold must be between 0.0 and 1.0, got {threshold}"
        ));
    }

    if config.debounce.window_secs == 0 {
        fail("debounce.window_secs must be greater than 0".to_string());
    }
    if config.debounce.max_devices == 0 {
        fail("debounce.max_devices must be greater than 0".to_string());
    }
    if config.debounce.max_per_window == 0 {
        fail("debounce.max_per_window must be greater than 0".to_string());
    }

    let push = &config.push;
    if push.attempt_cap == 0 {
        fail("push.attempt_cap must be at least 1".to_string());
    }
    // Provider tokens are only honoured for one hour.
    if push.token_ttl_secs == 0 || push.token_ttl_secs > 3600 {
        fail(format!(
            "push.token_ttl_secs must be between 1 and 3600, got {}",
            push.token_ttl_secs
        ));
    }
    if push.refresh_margin_secs >= push.token_ttl_secs {
        fail(format!(
            "push.refresh_margin_secs ({}) must be shorter than push.token_ttl_secs ({})",
            push.refresh_margin_secs, push.token_ttl_secs
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that every credential the push dispatcher needs is present.
///
/// Kept separate from [`validate_config`] so `check-config` can accept a
/// file without push credentials while `serve` refuses to start.
pub fn validate_push_credentials(config: &ScamguardConfig) -> Result<(), Vec<ConfigError>> {
    let push = &config.push;
    let errors: Vec<ConfigError> = [
        ("push.team_id", &push.team_id),
        ("push.key_id", &push.key_id),
        ("push.private_key_path", &push.private_key_path),
        ("push.bundle_id", &push.bundle_id),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
    .map(|(key, _)| ConfigError::MissingKey {
        key: key.to_string(),
    })
    .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
