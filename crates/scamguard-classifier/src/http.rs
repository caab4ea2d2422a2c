// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-over-HTTP classifier backend.
//!
//! Sends `{model, prompt, text}` to the configured endpoint and expects an
//! [`InferenceResponse`] body. One request per call; retrying is the client's job.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use scamguard_config::model::ClassifierConfig;
use scamguard_core::types::{InferenceResponse, MessageEvent};
use scamguard_core::{
    AdapterType, ClassifierBackend, ClassifierError, HealthStatus, PluginAdapter, ScamguardError,
};

use crate::prompt::resolve_prompt;

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    text: &'a str,
}

/// Production classifier backend reached over HTTP.
#[derive(Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint_url: String,
    model: String,
    api_key: Option<String>,
    prompt: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ScamguardError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ScamguardError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            prompt: resolve_prompt(config.prompt.as_deref()),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    /// Overrides the endpoint (for testing with wiremock).
    #[cfg(test)]
    pub fn with_endpoint_url(mut self, url: String) -> Self {
        self.endpoint_url = url;
        self
    }
}

impl fmt::Debug for HttpClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClassifier")
            .field("endpoint_url", &self.endpoint_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> ClassifierError {
    if err.is_timeout() {
        ClassifierError::Timeout { duration: timeout }
    } else {
        ClassifierError::Unavailable(format!("request to classifier failed: {err}"))
    }
}

/// Maps a non-success status onto the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> ClassifierError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ClassifierError::Unavailable(format!("classifier returned {status}"))
    } else {
        ClassifierError::ModelError(format!("classifier returned {status}: {body}"))
    }
}

#[async_trait]
impl PluginAdapter for HttpClassifier {
    fn name(&self) -> &str {
        "http-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, ScamguardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ScamguardError> {
        Ok(())
    }
}

#[async_trait]
impl ClassifierBackend for HttpClassifier {
    async fn infer(&self, event: &MessageEvent) -> Result<InferenceResponse, ClassifierError> {
        let body = InferenceRequest {
            model: &self.model,
            prompt: &self.prompt,
            text: &event.raw_text,
        };

        let mut request = self
            .client
            .post(&self.endpoint_url)
            .timeout(self.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        debug!(event_id = %event.event_id, status = %status, "classifier response received");

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        serde_json::from_str::<InferenceResponse>(&text)
            .map_err(|e| ClassifierError::ModelError(format!("failed to parse response: {e}")))
    }
}
