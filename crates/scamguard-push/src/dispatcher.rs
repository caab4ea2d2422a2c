// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of recorded alerts to devices.
//!
//! The alert record is the source of truth: attempts and status are written
//! back after every send, so a restart resumes where delivery stopped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use scamguard_config::model::PushConfig;
use scamguard_core::types::{AlertRecord, DeliveryOutcome, DeliveryStatus, DeliveryUpdate};
use scamguard_core::{AlertStore, DeviceDirectory, DispatchError, PushProvider, ScamguardError};
use scamguard_resilience::Backoff;

use crate::payload::notification_for;
use crate::token::ProviderTokenCache;

pub struct PushDispatcher {
    provider: Arc<dyn PushProvider>,
    tokens: Arc<ProviderTokenCache>,
    store: Arc<dyn AlertStore>,
    devices: Arc<dyn DeviceDirectory>,
    attempt_cap: u32,
    backoff: Backoff,
}

impl PushDispatcher {
    pub fn new(
        provider: Arc<dyn PushProvider>,
        tokens: Arc<ProviderTokenCache>,
        store: Arc<dyn AlertStore>,
        devices: Arc<dyn DeviceDirectory>,
        config: &PushConfig,
    ) -> Self {
        Self {
            provider,
            tokens,
            store,
            devices,
            attempt_cap: config.attempt_cap,
            backoff: Backoff::new(Duration::from_millis(config.backoff_base_ms)),
        }
    }

    /// Delivers the alert for `record`.
    ///
    /// Terminal records are returned unchanged. Otherwise sends are attempted
    /// until one succeeds, a permanent error occurs, or the record has used
    /// `attempt_cap` attempts; the record is updated after each one. Delivery
    /// failures are returned as [`ScamguardError::Dispatch`] after the record
    /// has been marked `failed`.
    pub async fn dispatch(&self, record: &AlertRecord) -> Result<DeliveryOutcome, ScamguardError> {
        if record.delivery_status.is_terminal() {
            return Ok(outcome(record, record.delivery_status, record.attempts, None));
        }

        let Some(device_token) = self.devices.push_token(&record.device_id).await? else {
            let err = DispatchError::DeviceUnregistered {
                reason: "no push token registered for device".into(),
            };
            warn!(
                alert_id = %record.alert_id,
                device_id = %record.device_id,
                "alert has no deliverable device"
            );
            self.mark(record, DeliveryStatus::Failed, record.attempts, None, Some(&err))
                .await?;
            return Err(err.into());
        };
        let notification = notification_for(record, device_token);

        let mut attempts = record.attempts;
        let mut last_sent = None;
        while attempts < self.attempt_cap {
            let token = match self.tokens.get().await {
                Ok(token) => token,
                Err(e) => {
                    error!(
                        alert_id = %record.alert_id,
                        error = %e,
                        "no provider token, alert failed"
                    );
                    self.mark(record, DeliveryStatus::Failed, attempts, last_sent, Some(&e))
                        .await?;
                    return Err(e.into());
                }
            };

            attempts += 1;
            last_sent = Some(Utc::now());
            let result = self.provider.send(&notification, &token).await;

            let err = match result {
                Ok(ack) => {
                    self.mark(record, DeliveryStatus::Delivered, attempts, last_sent, None)
                        .await?;
                    info!(
                        alert_id = %record.alert_id,
                        event_id = %record.event_id,
                        attempts,
                        "alert delivered"
                    );
                    #[cfg(feature = "prometheus")]
                    {
                        scamguard_prometheus::record_delivery_attempt("ok");
                        scamguard_prometheus::record_delivery(DeliveryStatus::Delivered.to_string());
                    }
                    return Ok(outcome(
                        record,
                        DeliveryStatus::Delivered,
                        attempts,
                        ack.provider_id,
                    ));
                }
                Err(e) => e,
            };
            #[cfg(feature = "prometheus")]
            scamguard_prometheus::record_delivery_attempt(err.kind());

            let retry = err.is_transient() && attempts < self.attempt_cap;
            let status = if retry {
                DeliveryStatus::Pending
            } else {
                DeliveryStatus::Failed
            };
            self.mark(record, status, attempts, last_sent, Some(&err))
                .await?;

            if !retry {
                if err.is_transient() {
                    error!(
                        alert_id = %record.alert_id,
                        attempts,
                        error = %err,
                        "alert delivery failed after exhausting attempts"
                    );
                } else {
                    warn!(
                        alert_id = %record.alert_id,
                        attempts,
                        error = %err,
                        "alert rejected by push provider"
                    );
                }
                if matches!(err, DispatchError::DeviceUnregistered { .. }) {
                    self.forget_device_token(record, &notification.device_token)
                        .await;
                }
                #[cfg(feature = "prometheus")]
                scamguard_prometheus::record_delivery(DeliveryStatus::Failed.to_string());
                return Err(err.into());
            }

            if err == DispatchError::TokenExpired {
                self.tokens.invalidate(&token);
            } else {
                let delay = self.backoff.delay(attempts);
                warn!(
                    alert_id = %record.alert_id,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "push attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        // Reached only by a record resumed with no attempts left.
        error!(
            alert_id = %record.alert_id,
            attempts,
            "alert delivery failed after exhausting attempts"
        );
        self.store
            .update_delivery(&DeliveryUpdate {
                alert_id: record.alert_id.clone(),
                status: DeliveryStatus::Failed,
                attempts,
                last_attempt_at: record.last_attempt_at,
                last_error: record.last_error.clone(),
            })
            .await?;
        #[cfg(feature = "prometheus")]
        scamguard_prometheus::record_delivery(DeliveryStatus::Failed.to_string());
        Err(DispatchError::AttemptsExhausted { attempts }.into())
    }

    /// Writes delivery bookkeeping. `last_sent` is `None` when no send
    /// happened, which keeps the record's previous attempt time.
    async fn mark(
        &self,
        record: &AlertRecord,
        status: DeliveryStatus,
        attempts: u32,
        last_sent: Option<DateTime<Utc>>,
        error: Option<&DispatchError>,
    ) -> Result<(), ScamguardError> {
        self.store
            .update_delivery(&DeliveryUpdate {
                alert_id: record.alert_id.clone(),
                status,
                attempts,
                last_attempt_at: last_sent.or(record.last_attempt_at),
                last_error: error.map(ToString::to_string),
            })
            .await
    }

    /// Drops a token the provider reported as unregistered so later alerts
    /// for the device fail fast instead of spending attempts on it.
    async fn forget_device_token(&self, record: &AlertRecord, device_token: &str) {
        match self
            .devices
            .remove_push_token(&record.device_id, device_token)
            .await
        {
            Ok(true) => info!(
                device_id = %record.device_id,
                "removed unregistered push token"
            ),
            Ok(false) => {}
            Err(e) => warn!(
                device_id = %record.device_id,
                error = %e,
                "failed to remove unregistered push token"
            ),
        }
    }
}

fn outcome(
    record: &AlertRecord,
    status: DeliveryStatus,
    attempts: u32,
    provider_id: Option<String>,
) -> DeliveryOutcome {
    DeliveryOutcome {
        alert_id: record.alert_id.clone(),
        event_id: record.event_id.clone(),
        status,
        attempts,
        provider_id,
    }
}
