// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama classifier backend.
//!
//! Calls `/api/generate` with streaming disabled. The model answers in free
//! text, so the verdict is the outermost JSON object found in the `response`
//! field. Text without a parseable verdict is a [`ClassifierError::ModelError`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scamguard_config::model::ClassifierConfig;
use scamguard_core::types::{InferenceResponse, MessageEvent};
use scamguard_core::{
    AdapterType, ClassifierBackend, ClassifierError, HealthStatus, PluginAdapter, ScamguardError,
};

use crate::http::{status_error, transport_error};
use crate::prompt::resolve_prompt;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: String,
    response: String,
}

/// Classifier backend for a local or remote Ollama server.
#[derive(Clone)]
pub struct OllamaClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    instructions: String,
    timeout: Duration,
}

impl OllamaClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ScamguardError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ScamguardError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            instructions: resolve_prompt(config.prompt.as_deref()),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Instructions followed by the message as a JSON string literal, so
    /// quotes and newlines in the text cannot break out of it.
    fn prompt_for(&self, text: &str) -> String {
        let quoted = serde_json::Value::String(text.to_string());
        format!("{}\n\nMessage to analyze:\n{quoted}", self.instructions)
    }
}

impl fmt::Debug for OllamaClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaClassifier")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The slice from the first `{` to the last `}`, skipping any prose or code
/// fences the model wrapped around its answer.
fn embedded_json(generated: &str) -> Option<&str> {
    let start = generated.find('{')?;
    let end = generated.rfind('}')?;
    (start < end).then(|| &generated[start..=end])
}

fn parse_verdict(generated: &GenerateResponse) -> Result<InferenceResponse, ClassifierError> {
    let json = embedded_json(&generated.response).ok_or_else(|| {
        ClassifierError::ModelError("no JSON object in generated text".to_string())
    })?;
    let mut verdict: InferenceResponse = serde_json::from_str(json)
        .map_err(|e| ClassifierError::ModelError(format!("failed to parse verdict: {e}")))?;
    if verdict.model_version.is_empty() {
        verdict.model_version = generated.model.clone();
    }
    Ok(verdict)
}

#[async_trait]
impl PluginAdapter for OllamaClassifier {
    fn name(&self) -> &str {
        "ollama-classifier"
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
impl ClassifierBackend for OllamaClassifier {
    async fn infer(&self, event: &MessageEvent) -> Result<InferenceResponse, ClassifierError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: self.prompt_for(&event.raw_text),
            stream: false,
        };

        let mut request = self
            .client
            .post(self.generate_url())
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
        debug!(event_id = %event.event_id, status = %status, "ollama response received");

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let generated: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ClassifierError::ModelError(format!("failed to parse response: {e}")))?;
        parse_verdict(&generated)
    }
}
