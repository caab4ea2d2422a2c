// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits for alert records and device push tokens.

use async_trait::async_trait;

use crate::error::ScamguardError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AlertDecision, AlertRecord, ClassificationResult, DeliveryStatus, DeliveryUpdate,
    RecordOutcome,
};

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ScamguardError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ScamguardError>;
}

/// The idempotency boundary for alerts.
///
/// `record` must be atomic: for a given `event_id` at most one record is ever
/// created, and a second call returns the existing record untouched.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persists an alerting decision, or returns the existing record for its event.
    async fn record(&self, decision: &AlertDecision) -> Result<RecordOutcome, ScamguardError>;

    /// Writes the result of a delivery attempt back to the record.
    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<(), ScamguardError>;

    /// Looks up the alert for an event, if one was recorded.
    async fn get_alert(&self, event_id: &str) -> Result<Option<AlertRecord>, ScamguardError>;

    /// Lists alerts newest first, optionally filtered by status.
    async fn list_alerts(
        &self,
        status: Option<DeliveryStatus>,
        limit: u32,
    ) -> Result<Vec<AlertRecord>, ScamguardError>;

    /// Alerts still waiting for delivery, oldest first.
    async fn pending_alerts(&self) -> Result<Vec<AlertRecord>, ScamguardError>;

    /// Appends a classification to the history table.
    async fn save_classification(
        &self,
        result: &ClassificationResult,
    ) -> Result<(), ScamguardError>;

    /// Fetches the stored classification for an event.
    async fn get_classification(
        &self,
        event_id: &str,
    ) -> Result<Option<ClassificationResult>, ScamguardError>;
}

/// Maps devices to the push token the provider addresses them by.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn push_token(&self, device_id: &str) -> Result<Option<String>, ScamguardError>;

    async fn upsert_push_token(
        &self,
        device_id: &str,
        push_token: &str,
    ) -> Result<(), ScamguardError>;

    /// Forgets `push_token` for the device if it is still the registered one.
    ///
    /// Returns whether a token was removed.
    async fn remove_push_token(
        &self,
        device_id: &str,
        push_token: &str,
    ) -> Result<bool, ScamguardError>;
}
