// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted classifier backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use scamguard_core::types::{InferenceResponse, MessageEvent, RiskCategory};
use scamguard_core::{
    AdapterType, ClassifierBackend, ClassifierError, HealthStatus, PluginAdapter, ScamguardError,
};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockInference {
    /// Answer with this score and raw category string (which may be invalid).
    Answer { score: f64, category: String },
    Fail(ClassifierError),
    /// Never answer; the client's timeout has to fire.
    Hang,
}

impl MockInference {
    pub fn answer(score: f64, category: impl Into<String>) -> Self {
        Self::Answer {
            score,
            category: category.into(),
        }
    }
}

/// A classifier backend that replays a script, then repeats a default answer.
pub struct MockClassifier {
    script: Mutex<VecDeque<MockInference>>,
    default: MockInference,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockClassifier {
    /// Always answers `benign` with a low score.
    pub fn new() -> Self {
        Self::with_default(MockInference::answer(0.05, "benign"))
    }

    pub fn scoring(score: f64, category: RiskCategory) -> Self {
        Self::with_default(MockInference::answer(score, category.to_string()))
    }

    pub fn failing(error: ClassifierError) -> Self {
        Self::with_default(MockInference::Fail(error))
    }

    pub fn hanging() -> Self {
        Self::with_default(MockInference::Hang)
    }

    fn with_default(default: MockInference) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answers to give, in order, before falling back to the default.
    pub fn with_script(mut self, script: Vec<MockInference>) -> Self {
        self.script = Mutex::new(script.into());
        self
    }

    /// Latency added to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of inference requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
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
impl ClassifierBackend for MockClassifier {
    async fn infer(&self, _event: &MessageEvent) -> Result<InferenceResponse, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match next {
            MockInference::Answer { score, category } => Ok(InferenceResponse {
                risk_score: score,
                risk_category: category,
                model_version: "mock-1".to_string(),
                detected_patterns: Vec::new(),
                explanation: None,
                recommended_action: None,
            }),
            MockInference::Fail(error) => Err(error),
            MockInference::Hang => std::future::pending().await,
        }
    }
}
