// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilient classification over any [`ClassifierBackend`].
//!
//! Each attempt is bounded by a timeout and gated by the circuit breaker.
//! Transient failures are retried with exponential backoff; malformed answers
//! are returned immediately.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use scamguard_config::model::ClassifierConfig;
use scamguard_core::types::{ClassificationResult, InferenceResponse, MessageEvent, RiskCategory};
use scamguard_core::{ClassifierBackend, ClassifierError};
use scamguard_resilience::{Backoff, BreakerState, CircuitBreaker, CircuitBreakerConfig};

pub struct ClassifierClient {
    backend: Arc<dyn ClassifierBackend>,
    breaker: CircuitBreaker,
    backoff: Backoff,
    timeout: Duration,
    max_retries: u32,
}

impl ClassifierClient {
    pub fn new(backend: Arc<dyn ClassifierBackend>, config: &ClassifierConfig) -> Self {
        let breaker = CircuitBreaker::new(
            backend.name().to_string(),
            CircuitBreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                window: Duration::from_secs(config.breaker_window_secs),
                cooldown: Duration::from_secs(config.breaker_cooldown_secs),
            },
        );
        Self {
            backend,
            breaker,
            backoff: Backoff::new(Duration::from_millis(config.backoff_base_ms)),
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
        }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// How long the breaker has been in its current state.
    pub fn breaker_state_age(&self) -> Duration {
        self.breaker.last_transition().elapsed()
    }

    /// Classifies one event, retrying transient failures up to `max_retries` times.
    ///
    /// An open breaker fails the call with `Unavailable` at once, without retries.
    pub async fn classify(
        &self,
        event: &MessageEvent,
    ) -> Result<ClassificationResult, ClassifierError> {
        let mut retry = 0;
        loop {
            if let Err(open) = self.breaker.try_acquire() {
                debug!(
                    event_id = %event.event_id,
                    retry_after_ms = open.retry_after.as_millis() as u64,
                    "classifier circuit open, short-circuiting"
                );
                return Err(ClassifierError::Unavailable(
                    "classifier circuit breaker is open".into(),
                ));
            }

            let result = self.attempt(event).await;
            match &result {
                Ok(_) => self.breaker.record_success(),
                Err(_) => self.breaker.record_failure(),
            }

            match result {
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.backoff.delay(retry);
                    warn!(
                        event_id = %event.event_id,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "classifier attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn attempt(&self, event: &MessageEvent) -> Result<ClassificationResult, ClassifierError> {
        let started = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.backend.infer(event))
            .await
            .map_err(|_| ClassifierError::Timeout {
                duration: self.timeout,
            })??;
        let latency_ms = started.elapsed().as_millis() as u64;
        validate(event, response, latency_ms)
    }
}

/// Rejects scores outside `0.0..=1.0` and unknown categories.
fn validate(
    event: &MessageEvent,
    response: InferenceResponse,
    latency_ms: u64,
) -> Result<ClassificationResult, ClassifierError> {
    let score = response.risk_score;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(ClassifierError::ModelError(format!(
            "risk_score {score} is outside 0.0..=1.0"
        )));
    }
    let category = RiskCategory::from_str(&response.risk_category).map_err(|_| {
        ClassifierError::ModelError(format!(
            "unknown risk_category `{}`",
            response.risk_category
        ))
    })?;

    Ok(ClassificationResult {
        event_id: event.event_id.clone(),
        risk_score: score,
        risk_category: category,
        model_version: response.model_version,
        detected_patterns: response.detected_patterns,
        explanation: response.explanation,
        recommended_action: response.recommended_action,
        latency_ms,
        produced_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use scamguard_core::{AdapterType, HealthStatus, PluginAdapter, ScamguardError};

    enum Step {
        Answer(InferenceResponse),
        Fail(ClassifierError),
        Hang,
    }

    /// Plays back scripted steps; the last step repeats once the script runs out.
    struct ScriptedBackend {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PluginAdapter for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
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
    impl ClassifierBackend for ScriptedBackend {
        async fn infer(&self, _event: &MessageEvent) -> Result<InferenceResponse, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = {
                let mut steps = self.steps.lock().unwrap();
                if steps.len() > 1 {
                    steps.pop_front()
                } else {
                    steps.front().map(|s| match s {
                        Step::Answer(r) => Step::Answer(r.clone()),
                        Step::Fail(e) => Step::Fail(e.clone()),
                        Step::Hang => Step::Hang,
                    })
                }
            };
            match step {
                Some(Step::Answer(r)) => Ok(r),
                Some(Step::Fail(e)) => Err(e),
                Some(Step::Hang) | None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ClassifierError::Unavailable("unreachable".into()))
                }
            }
        }
    }

    fn answer(score: f64, category: &str) -> Step {
        Step::Answer(InferenceResponse {
            risk_score: score,
            risk_category: category.into(),
            model_version: "test-model".into(),
            detected_patterns: vec![],
            explanation: None,
            recommended_action: None,
        })
    }

    fn unavailable() -> Step {
        Step::Fail(ClassifierError::Unavailable("connection refused".into()))
    }

    fn client(backend: Arc<ScriptedBackend>, config: ClassifierConfig) -> ClassifierClient {
        ClassifierClient::new(backend, &config)
    }

    fn event() -> MessageEvent {
        MessageEvent::new("evt-1", "dev-1", "user-1", "hello", Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn valid_answer_becomes_result() {
        let backend = ScriptedBackend::new(vec![answer(0.8, "fraud")]);
        let result = client(backend.clone(), ClassifierConfig::default())
            .classify(&event())
            .await
            .unwrap();

        assert_eq!(result.event_id, "evt-1");
        assert_eq!(result.risk_category, RiskCategory::Fraud);
        assert_eq!(result.risk_score, 0.8);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn model_advice_is_carried_into_result() {
        let backend = ScriptedBackend::new(vec![Step::Answer(InferenceResponse {
            risk_score: 0.97,
            risk_category: "fraud".into(),
            model_version: "gemma3:4b".into(),
            detected_patterns: vec!["guaranteed returns".into()],
            explanation: Some("Promises unrealistic profit.".into()),
            recommended_action: Some("stop the transfer".into()),
        })]);
        let result = client(backend, ClassifierConfig::default())
            .classify(&event())
            .await
            .unwrap();

        assert_eq!(result.detected_patterns, vec!["guaranteed returns"]);
        assert_eq!(result.explanation.as_deref(), Some("Promises unrealistic profit."));
        assert_eq!(result.recommended_action.as_deref(), Some("stop the transfer"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let backend = ScriptedBackend::new(vec![unavailable(), answer(0.1, "benign")]);
        let result = client(backend.clone(), ClassifierConfig::default())
            .classify(&event())
            .await
            .unwrap();

        assert_eq!(result.risk_category, RiskCategory::Benign);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_times_out_after_all_attempts() {
        let backend = ScriptedBackend::new(vec![Step::Hang]);
        let err = client(backend.clone(), ClassifierConfig::default())
            .classify(&event())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClassifierError::Timeout {
                duration: Duration::from_millis(3000)
            }
        );
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_score_is_not_retried() {
        let backend = ScriptedBackend::new(vec![answer(1.5, "fraud")]);
        let err = client(backend.clone(), ClassifierConfig::default())
            .classify(&event())
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifierError::ModelError(_)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_category_is_not_coerced() {
        for category in ["FRAUD", "scam", ""] {
            let backend = ScriptedBackend::new(vec![answer(0.5, category)]);
            let err = client(backend.clone(), ClassifierConfig::default())
                .classify(&event())
                .await
                .unwrap_err();
            assert!(matches!(err, ClassifierError::ModelError(_)), "{category}");
            assert_eq!(backend.calls(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn nan_score_is_model_error() {
        let backend = ScriptedBackend::new(vec![answer(f64::NAN, "fraud")]);
        let err = client(backend, ClassifierConfig::default())
            .classify(&event())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_opens_then_retries_after_cooldown() {
        let config = ClassifierConfig {
            max_retries: 0,
            breaker_failure_threshold: 3,
            ..ClassifierConfig::default()
        };
        let backend = ScriptedBackend::new(vec![
            unavailable(),
            unavailable(),
            unavailable(),
            answer(0.2, "benign"),
        ]);
        let client = client(backend.clone(), config);

        for _ in 0..3 {
            assert!(client.classify(&event()).await.is_err());
        }
        assert_eq!(client.breaker_state(), BreakerState::Open);

        let err = client.classify(&event()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Unavailable(_)));
        assert_eq!(backend.calls(), 3, "open breaker must not reach the backend");

        tokio::time::advance(Duration::from_secs(30)).await;
        let result = client.classify(&event()).await.unwrap();
        assert_eq!(result.risk_category, RiskCategory::Benign);
        assert_eq!(client.breaker_state(), BreakerState::Closed);
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_stops_retries() {
        let config = ClassifierConfig {
            max_retries: 5,
            breaker_failure_threshold: 2,
            ..ClassifierConfig::default()
        };
        let backend = ScriptedBackend::new(vec![unavailable()]);
        let client = client(backend.clone(), config);

        let err = client.classify(&event()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Unavailable(_)));
        assert_eq!(backend.calls(), 2);
    }
}
