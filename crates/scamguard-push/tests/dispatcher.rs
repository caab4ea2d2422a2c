// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatcher behaviour against SQLite alert records.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};

use scamguard_config::model::{PushConfig, StorageConfig};
use scamguard_core::types::{
    AlertDecision, AlertRecord, DecisionReason, DeliveryStatus, DeliveryUpdate, RiskCategory,
    text_fingerprint,
};
use scamguard_core::{AlertStore, DeviceDirectory, DispatchError, ScamguardError, StorageAdapter};
use scamguard_push::{ProviderTokenCache, PushDispatcher};
use scamguard_storage::SqliteStorage;
use scamguard_test_utils::{CountingTokenIssuer, MockPushProvider};

struct Fixture {
    storage: Arc<SqliteStorage>,
    push: Arc<MockPushProvider>,
    issuer: Arc<CountingTokenIssuer>,
    tokens: Arc<ProviderTokenCache>,
    dispatcher: PushDispatcher,
    _dir: tempfile::TempDir,
}

async fn fixture(push: MockPushProvider, issuer: CountingTokenIssuer) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("alerts.db").to_string_lossy().to_string(),
        ..StorageConfig::default()
    });
    storage.initialize().await.unwrap();
    let storage = Arc::new(storage);

    let config = PushConfig {
        backoff_base_ms: 1,
        ..PushConfig::default()
    };
    let push = Arc::new(push);
    let issuer = Arc::new(issuer);
    let tokens = Arc::new(ProviderTokenCache::from_config(issuer.clone(), &config));
    let dispatcher = PushDispatcher::new(
        push.clone(),
        tokens.clone(),
        storage.clone(),
        storage.clone(),
        &config,
    );

    Fixture {
        storage,
        push,
        issuer,
        tokens,
        dispatcher,
        _dir: dir,
    }
}

impl Fixture {
    /// Records a pending fraud alert for `device_id` and registers its push token.
    async fn pending_alert(&self, event_id: &str, device_id: &str) -> AlertRecord {
        self.storage
            .upsert_push_token(device_id, &format!("apns-{device_id}"))
            .await
            .unwrap();
        let decision = AlertDecision {
            event_id: event_id.into(),
            device_id: device_id.into(),
            fingerprint: text_fingerprint(event_id),
            should_alert: true,
            reason: DecisionReason::CategoryMatched,
            risk_score: Some(0.6),
            risk_category: Some(RiskCategory::Fraud),
            decided_at: Utc::now(),
        };
        self.storage.record(&decision).await.unwrap().into_record()
    }

    async fn stored(&self, event_id: &str) -> AlertRecord {
        self.storage.get_alert(event_id).await.unwrap().unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_token_is_refreshed_once_for_concurrent_dispatches() {
    let f = fixture(
        MockPushProvider::new(),
        CountingTokenIssuer::default().with_delay(Duration::from_millis(20)),
    )
    .await;

    let mut records = Vec::new();
    for i in 0..50 {
        records.push(f.pending_alert(&format!("evt-{i}"), &format!("dev-{i}")).await);
    }

    let stale = f.tokens.get().await.unwrap();
    assert_eq!(stale.token, "token-1");
    f.push.expire_token("token-1").await;

    let outcomes =
        futures::future::join_all(records.iter().map(|r| f.dispatcher.dispatch(r))).await;

    assert_eq!(f.issuer.issued(), 2, "exactly one refresh after the rejection");
    for outcome in outcomes {
        assert_eq!(outcome.unwrap().status, DeliveryStatus::Delivered);
    }
    let sent = f.push.sent().await;
    assert_eq!(sent.len(), 50);
    assert!(sent.iter().all(|s| s.provider_token == "token-2"));
}

#[tokio::test]
async fn always_transient_provider_uses_exactly_attempt_cap() {
    let f = fixture(
        MockPushProvider::failing(DispatchError::ProviderRejected {
            status: 503,
            reason: "ServiceUnavailable".into(),
            permanent: false,
        }),
        CountingTokenIssuer::default(),
    )
    .await;
    let record = f.pending_alert("evt-1", "dev-1").await;

    let err = f.dispatcher.dispatch(&record).await.unwrap_err();
    assert!(matches!(
        err,
        ScamguardError::Dispatch(DispatchError::ProviderRejected { status: 503, .. })
    ));
    assert_eq!(f.push.attempts(), 3);

    let stored = f.stored("evt-1").await;
    assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert!(stored.last_attempt_at.is_some());
}

#[tokio::test]
async fn permanent_rejection_is_not_retried() {
    let f = fixture(
        MockPushProvider::failing(DispatchError::DeviceUnregistered {
            reason: "Unregistered".into(),
        }),
        CountingTokenIssuer::default(),
    )
    .await;
    let record = f.pending_alert("evt-1", "dev-1").await;

    assert!(f.dispatcher.dispatch(&record).await.is_err());
    assert_eq!(f.push.attempts(), 1);

    let stored = f.stored("evt-1").await;
    assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.last_error.unwrap().contains("Unregistered"));
}

#[tokio::test]
async fn unregistered_device_token_is_forgotten() {
    let f = fixture(
        MockPushProvider::failing(DispatchError::DeviceUnregistered {
            reason: "Unregistered".into(),
        }),
        CountingTokenIssuer::default(),
    )
    .await;
    let record = f.pending_alert("evt-1", "dev-1").await;
    assert!(f.dispatcher.dispatch(&record).await.is_err());
    assert_eq!(f.storage.push_token("dev-1").await.unwrap(), None);

    // The next alert for the device fails without spending a send.
    let decision = AlertDecision {
        event_id: "evt-2".into(),
        device_id: "dev-1".into(),
        fingerprint: text_fingerprint("evt-2"),
        should_alert: true,
        reason: DecisionReason::ThresholdExceeded,
        risk_score: Some(0.9),
        risk_category: Some(RiskCategory::Fraud),
        decided_at: Utc::now(),
    };
    let next = f.storage.record(&decision).await.unwrap().into_record();
    assert!(f.dispatcher.dispatch(&next).await.is_err());
    assert_eq!(f.push.attempts(), 1);

    let stored = f.stored("evt-2").await;
    assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 0);
    assert!(stored.last_attempt_at.is_none());
}

#[tokio::test]
async fn resumed_record_without_attempts_left_fails() {
    let f = fixture(MockPushProvider::new(), CountingTokenIssuer::default()).await;
    let record = f.pending_alert("evt-1", "dev-1").await;
    let last_attempt = Utc::now() - TimeDelta::minutes(2);
    f.storage
        .update_delivery(&DeliveryUpdate {
            alert_id: record.alert_id.clone(),
            status: DeliveryStatus::Pending,
            attempts: 3,
            last_attempt_at: Some(last_attempt),
            last_error: Some("network error: connection reset".into()),
        })
        .await
        .unwrap();
    let resumed = f.stored("evt-1").await;

    let err = f.dispatcher.dispatch(&resumed).await.unwrap_err();
    assert!(matches!(
        err,
        ScamguardError::Dispatch(DispatchError::AttemptsExhausted { attempts: 3 })
    ));
    assert_eq!(f.push.attempts(), 0);

    let stored = f.stored("evt-1").await;
    assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.last_attempt_at, resumed.last_attempt_at);
    assert_eq!(stored.last_error.as_deref(), Some("network error: connection reset"));
}

#[tokio::test]
async fn transient_failure_then_success_is_delivered() {
    let f = fixture(
        MockPushProvider::new().with_script(vec![Err(DispatchError::NetworkError(
            "connection reset".into(),
        ))]),
        CountingTokenIssuer::default(),
    )
    .await;
    let record = f.pending_alert("evt-1", "dev-1").await;

    let outcome = f.dispatcher.dispatch(&record).await.unwrap();
    assert_eq!(outcome.status, DeliveryStatus::Delivered);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.provider_id.as_deref(), Some(record.alert_id.as_str()));

    let stored = f.stored("evt-1").await;
    assert_eq!(stored.delivery_status, DeliveryStatus::Delivered);
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn signing_failure_fails_alerts_fast() {
    let f = fixture(MockPushProvider::new(), CountingTokenIssuer::default()).await;
    f.issuer.set_failing(true);
    let first = f.pending_alert("evt-1", "dev-1").await;
    let second = f.pending_alert("evt-2", "dev-2").await;

    let err = f.dispatcher.dispatch(&first).await.unwrap_err();
    assert!(matches!(
        err,
        ScamguardError::Dispatch(DispatchError::Credential(_))
    ));
    assert!(f.dispatcher.dispatch(&second).await.is_err());

    assert_eq!(f.issuer.issued(), 1, "second dispatch must not re-sign");
    assert_eq!(f.push.attempts(), 0);
    for event_id in ["evt-1", "evt-2"] {
        let stored = f.stored(event_id).await;
        assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
        assert_eq!(stored.attempts, 0);
        assert!(stored.last_attempt_at.is_none());
    }
}

#[tokio::test]
async fn terminal_records_are_returned_as_is() {
    let f = fixture(MockPushProvider::new(), CountingTokenIssuer::default()).await;
    let record = f.pending_alert("evt-1", "dev-1").await;
    f.dispatcher.dispatch(&record).await.unwrap();

    let delivered = f.stored("evt-1").await;
    let again = f.dispatcher.dispatch(&delivered).await.unwrap();
    assert_eq!(again.status, DeliveryStatus::Delivered);
    assert_eq!(again.attempts, 1);
    assert_eq!(f.push.attempts(), 1);
}

#[tokio::test]
async fn expiring_token_is_replaced_before_use() {
    let f = fixture(
        MockPushProvider::new(),
        CountingTokenIssuer::new(TimeDelta::minutes(5)),
    )
    .await;
    let record = f.pending_alert("evt-1", "dev-1").await;

    // Every token lives inside the ten minute refresh margin.
    f.tokens.get().await.unwrap();
    f.dispatcher.dispatch(&record).await.unwrap();

    assert_eq!(f.issuer.issued(), 2);
    assert_eq!(f.push.sent().await[0].provider_token, "token-2");
}
