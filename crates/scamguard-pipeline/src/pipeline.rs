// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event processing: debounce, classify, decide, record, dispatch.
//!
//! Every event runs in its own task on a [`TaskTracker`] so callers can go
//! away without cancelling work, and shutdown can wait for in-flight events.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use scamguard_classifier::ClassifierClient;
use scamguard_core::types::{
    AlertDecision, AlertRecord, DeliveryOutcome, MessageEvent, RecordOutcome,
};
use scamguard_core::{AlertStore, ScamguardError};
use scamguard_push::PushDispatcher;

use crate::debounce::{Admission, DebounceCache};
use crate::decision::{AlertPolicy, decide};

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Dropped by the debounce cache before classification.
    Skipped {
        event_id: String,
        admission: Admission,
    },
    Decided {
        decision: AlertDecision,
        /// The alert record as stored, or the earlier record for a replayed event.
        alert: Option<AlertRecord>,
        /// Set when a newly created record went through the dispatcher.
        delivery: Option<DeliveryOutcome>,
    },
}

impl PipelineOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Skipped { event_id, .. } => event_id,
            Self::Decided { decision, .. } => &decision.event_id,
        }
    }

    pub fn should_alert(&self) -> bool {
        matches!(self, Self::Decided { decision, .. } if decision.should_alert)
    }

    /// Short status label for API responses.
    pub fn status(&self) -> String {
        match self {
            Self::Skipped { admission, .. } => admission.as_str().to_string(),
            Self::Decided { decision, .. } if !decision.should_alert => "no_alert".to_string(),
            Self::Decided {
                delivery: Some(delivery),
                ..
            } => delivery.status.to_string(),
            Self::Decided {
                alert: Some(alert), ..
            } => alert.delivery_status.to_string(),
            Self::Decided { .. } => "pending".to_string(),
        }
    }
}

pub struct AlertPipeline {
    debounce: DebounceCache,
    classifier: Arc<ClassifierClient>,
    policy: AlertPolicy,
    store: Arc<dyn AlertStore>,
    dispatcher: Arc<PushDispatcher>,
    tracker: TaskTracker,
}

impl AlertPipeline {
    pub fn new(
        debounce: DebounceCache,
        classifier: Arc<ClassifierClient>,
        policy: AlertPolicy,
        store: Arc<dyn AlertStore>,
        dispatcher: Arc<PushDispatcher>,
    ) -> Self {
        Self {
            debounce,
            classifier,
            policy,
            store,
            dispatcher,
            tracker: TaskTracker::new(),
        }
    }

    pub fn classifier(&self) -> &Arc<ClassifierClient> {
        &self.classifier
    }

    /// Number of events and resumed deliveries still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Runs one event through the whole pipeline.
    pub async fn process(&self, event: MessageEvent) -> Result<PipelineOutcome, ScamguardError> {
        let admission = self
            .debounce
            .check(&event.device_id, &event.fingerprint, Instant::now());
        #[cfg(feature = "prometheus")]
        scamguard_prometheus::record_event(admission.as_str());
        if admission != Admission::Admitted {
            debug!(
                event_id = %event.event_id,
                device_id = %event.device_id,
                outcome = admission.as_str(),
                "event dropped before classification"
            );
            return Ok(PipelineOutcome::Skipped {
                event_id: event.event_id,
                admission,
            });
        }

        if let Some(existing) = self.store.get_alert(&event.event_id).await?
            && existing.device_id != event.device_id
        {
            return Err(device_conflict(&event, &existing));
        }

        let classification = self.classifier.classify(&event).await;
        match &classification {
            Ok(result) => {
                if let Err(e) = self.store.save_classification(result).await {
                    warn!(
                        event_id = %event.event_id,
                        error = %e,
                        "failed to persist classification"
                    );
                }
            }
            Err(e) => warn!(event_id = %event.event_id, error = %e, "classification failed"),
        }
        #[cfg(feature = "prometheus")]
        self.record_classification_metrics(&classification);

        let decision = decide(&event, classification.as_ref(), &self.policy, Utc::now());
        info!(
            event_id = %event.event_id,
            device_id = %event.device_id,
            should_alert = decision.should_alert,
            reason = %decision.reason,
            "alert decision"
        );
        #[cfg(feature = "prometheus")]
        scamguard_prometheus::record_decision(decision.reason.to_string());

        if !decision.should_alert {
            return Ok(PipelineOutcome::Decided {
                decision,
                alert: None,
                delivery: None,
            });
        }

        let record = match self.store.record(&decision).await? {
            RecordOutcome::Created(record) => record,
            // Lost a race with another device using the same id.
            RecordOutcome::Duplicate(existing) if existing.device_id != decision.device_id => {
                return Err(device_conflict(&event, &existing));
            }
            RecordOutcome::Duplicate(existing) => {
                debug!(event_id = %event.event_id, "alert already recorded for event");
                return Ok(PipelineOutcome::Decided {
                    decision,
                    alert: Some(existing),
                    delivery: None,
                });
            }
        };

        let delivery = self.deliver(&record).await?;
        Ok(PipelineOutcome::Decided {
            decision,
            alert: Some(record),
            delivery: Some(delivery),
        })
    }

    /// Processes `event` in a tracked background task.
    pub fn submit(
        self: &Arc<Self>,
        event: MessageEvent,
    ) -> JoinHandle<Result<PipelineOutcome, ScamguardError>> {
        let pipeline = Arc::clone(self);
        self.tracker.spawn(async move {
            let event_id = event.event_id.clone();
            let result = pipeline.process(event).await;
            if let Err(e) = &result {
                error!(event_id = %event_id, error = %e, "event processing failed");
            }
            result
        })
    }

    /// Restarts delivery of every alert left `pending` by a previous run.
    pub async fn resume_pending(self: &Arc<Self>) -> Result<usize, ScamguardError> {
        let pending = self.store.pending_alerts().await?;
        let count = pending.len();
        for record in pending {
            let pipeline = Arc::clone(self);
            self.tracker.spawn(async move {
                if let Err(e) = pipeline.dispatcher.dispatch(&record).await {
                    warn!(alert_id = %record.alert_id, error = %e, "resumed delivery failed");
                }
            });
        }
        if count > 0 {
            info!(count, "resumed pending alert deliveries");
        }
        Ok(count)
    }

    /// Stops accepting tracked work and waits for in-flight tasks.
    ///
    /// Returns `false` if tasks were still running when `timeout` elapsed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }

    async fn deliver(&self, record: &AlertRecord) -> Result<DeliveryOutcome, ScamguardError> {
        match self.dispatcher.dispatch(record).await {
            Ok(outcome) => Ok(outcome),
            // The dispatcher has already written the failure to the record.
            Err(ScamguardError::Dispatch(_)) => {
                let stored = self.store.get_alert(&record.event_id).await?;
                let current = stored.as_ref().unwrap_or(record);
                Ok(DeliveryOutcome {
                    alert_id: current.alert_id.clone(),
                    event_id: current.event_id.clone(),
                    status: current.delivery_status,
                    attempts: current.attempts,
                    provider_id: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(feature = "prometheus")]
    fn record_classification_metrics(
        &self,
        classification: &Result<
            scamguard_core::types::ClassificationResult,
            scamguard_core::ClassifierError,
        >,
    ) {
        use scamguard_core::ClassifierError;
        use scamguard_resilience::BreakerState;

        let outcome = match classification {
            Ok(result) => {
                scamguard_prometheus::record_classifier_latency(result.latency_ms as f64 / 1000.0);
                "success"
            }
            Err(ClassifierError::Timeout { .. }) => "timeout",
            Err(ClassifierError::ModelError(_)) => "model_error",
            Err(ClassifierError::Unavailable(_)) => "unavailable",
        };
        scamguard_prometheus::record_classification(outcome);
        scamguard_prometheus::set_breaker_open(
            self.classifier.breaker_state() == BreakerState::Open,
        );
    }
}

fn device_conflict(event: &MessageEvent, existing: &AlertRecord) -> ScamguardError {
    warn!(
        event_id = %event.event_id,
        device_id = %event.device_id,
        recorded_device_id = %existing.device_id,
        "event id already used by another device"
    );
    ScamguardError::Conflict(format!(
        "event {} belongs to another device",
        event.event_id
    ))
}
