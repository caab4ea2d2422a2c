// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage, alert store and device directory traits.

use async_trait::async_trait;
use chrono::TimeDelta;
use tokio::sync::OnceCell;
use tracing::debug;

use scamguard_config::model::StorageConfig;
use scamguard_core::types::{
    AlertDecision, AlertRecord, ClassificationResult, DeliveryStatus, DeliveryUpdate,
    RecordOutcome,
};
use scamguard_core::{
    AdapterType, AlertStore, DeviceDirectory, HealthStatus, PluginAdapter, ScamguardError,
    StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other call
/// fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. The database is not opened until `initialize`.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ScamguardError> {
        self.db.get().ok_or_else(|| ScamguardError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    fn duplicate_window(&self) -> TimeDelta {
        // Capped at ten years so the cutoff timestamp stays representable.
        let secs = self.config.duplicate_window_secs.min(10 * 365 * 24 * 3600);
        TimeDelta::seconds(secs as i64)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ScamguardError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ScamguardError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ScamguardError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ScamguardError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ScamguardError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl AlertStore for SqliteStorage {
    async fn record(&self, decision: &AlertDecision) -> Result<RecordOutcome, ScamguardError> {
        queries::alerts::record_decision(self.db()?, decision, self.duplicate_window()).await
    }

    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<(), ScamguardError> {
        queries::alerts::update_delivery(self.db()?, update).await
    }

    async fn get_alert(&self, event_id: &str) -> Result<Option<AlertRecord>, ScamguardError> {
        queries::alerts::get_alert(self.db()?, event_id).await
    }

    async fn list_alerts(
        &self,
        status: Option<DeliveryStatus>,
        limit: u32,
    ) -> Result<Vec<AlertRecord>, ScamguardError> {
        queries::alerts::list_alerts(self.db()?, status, limit).await
    }

    async fn pending_alerts(&self) -> Result<Vec<AlertRecord>, ScamguardError> {
        queries::alerts::pending_alerts(self.db()?).await
    }

    async fn save_classification(
        &self,
        result: &ClassificationResult,
    ) -> Result<(), ScamguardError> {
        queries::classifications::save_classification(self.db()?, result).await
    }

    async fn get_classification(
        &self,
        event_id: &str,
    ) -> Result<Option<ClassificationResult>, ScamguardError> {
        queries::classifications::get_classification(self.db()?, event_id).await
    }
}

#[async_trait]
impl DeviceDirectory for SqliteStorage {
    async fn push_token(&self, device_id: &str) -> Result<Option<String>, ScamguardError> {
        queries::devices::get_push_token(self.db()?, device_id).await
    }

    async fn upsert_push_token(
        &self,
        device_id: &str,
        push_token: &str,
    ) -> Result<(), ScamguardError> {
        queries::devices::upsert_push_token(self.db()?, device_id, push_token).await
    }

    async fn remove_push_token(
        &self,
        device_id: &str,
        push_token: &str,
    ) -> Result<bool, ScamguardError> {
        queries::devices::remove_push_token(self.db()?, device_id, push_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scamguard_core::types::{DecisionReason, RiskCategory};
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            duplicate_window_secs: 300,
        }
    }

    fn alerting(event_id: &str) -> AlertDecision {
        AlertDecision {
            event_id: event_id.into(),
            device_id: "d1".into(),
            fingerprint: "fp".into(),
            should_alert: true,
            reason: DecisionReason::CategoryMatched,
            risk_score: Some(0.5),
            risk_category: Some(RiskCategory::Fraud),
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sqlite_storage_identity() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        let err = storage.get_alert("e1").await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn double_initialize_fails() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("durable.db");
        let path = db_path.to_str().unwrap();

        {
            let storage = SqliteStorage::new(make_config(path));
            storage.initialize().await.unwrap();
            storage.record(&alerting("e1")).await.unwrap();
            storage.close().await.unwrap();
        }

        let storage = SqliteStorage::new(make_config(path));
        storage.initialize().await.unwrap();
        assert_eq!(
            storage.health_check().await.unwrap(),
            HealthStatus::Healthy
        );
        let again = storage.record(&alerting("e1")).await.unwrap();
        assert!(again.is_duplicate());

        // A new event with the same text right after restart is suppressed durably.
        let repeat = storage.record(&alerting("e2")).await.unwrap();
        assert_eq!(
            repeat.record().delivery_status,
            DeliveryStatus::SuppressedDuplicate
        );
        assert_eq!(storage.pending_alerts().await.unwrap().len(), 1);
    }
}
