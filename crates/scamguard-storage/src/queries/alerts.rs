// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert record operations.
//!
//! `record_decision` is the idempotency boundary for dispatch: the existence
//! check and the insert run in one transaction on the writer thread, backed by
//! the UNIQUE constraint on `event_id`.

use chrono::{SubsecRound, TimeDelta, Utc};
use rusqlite::{params, OptionalExtension, Row};
use scamguard_core::types::{
    AlertDecision, AlertRecord, DeliveryStatus, DeliveryUpdate, RecordOutcome,
};
use scamguard_core::ScamguardError;

use super::{format_ts, parse_enum, parse_ts};
use crate::database::{map_tr_err, Database};

const ALERT_COLUMNS: &str = "alert_id, event_id, device_id, fingerprint, reason, risk_category,
     risk_score, delivery_status, attempts, last_error, created_at, last_attempt_at";

fn row_to_alert(row: &Row<'_>) -> Result<AlertRecord, rusqlite::Error> {
    let reason: String = row.get(4)?;
    let category: Option<String> = row.get(5)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(10)?;
    let last_attempt_at: Option<String> = row.get(11)?;

    Ok(AlertRecord {
        alert_id: row.get(0)?,
        event_id: row.get(1)?,
        device_id: row.get(2)?,
        fingerprint: row.get(3)?,
        reason: parse_enum(4, &reason)?,
        risk_category: category.map(|c| parse_enum(5, &c)).transpose()?,
        risk_score: row.get(6)?,
        delivery_status: parse_enum(7, &status)?,
        attempts: row.get(8)?,
        last_error: row.get(9)?,
        created_at: parse_ts(10, &created_at)?,
        last_attempt_at: last_attempt_at.map(|t| parse_ts(11, &t)).transpose()?,
    })
}

/// Records an alerting decision.
///
/// Returns `Duplicate` with the untouched existing row when the event was
/// already recorded. Otherwise inserts a new row, as `suppressed_duplicate`
/// if a pending or delivered alert with the same device and fingerprint was
/// created within `duplicate_window`, else as `pending`.
pub async fn record_decision(
    db: &Database,
    decision: &AlertDecision,
    duplicate_window: TimeDelta,
) -> Result<RecordOutcome, ScamguardError> {
    if !decision.should_alert {
        return Err(ScamguardError::Validation(format!(
            "decision for event {} does not alert",
            decision.event_id
        )));
    }

    let decision = decision.clone();
    let now = Utc::now().trunc_subsecs(3);
    let cutoff = format_ts(now - duplicate_window);

    db.connection()
        .call(move |conn| -> Result<RecordOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;

            let existing = tx
                .query_row(
                    &format!("SELECT {ALERT_COLUMNS} FROM alert_records WHERE event_id = ?1"),
                    params![decision.event_id],
                    row_to_alert,
                )
                .optional()?;
            if let Some(existing) = existing {
                return Ok(RecordOutcome::Duplicate(existing));
            }

            let prior: Option<String> = tx
                .query_row(
                    "SELECT alert_id FROM alert_records
                     WHERE device_id = ?1 AND fingerprint = ?2
                       AND delivery_status IN ('pending', 'delivered')
                       AND created_at >= ?3
                     LIMIT 1",
                    params![decision.device_id, decision.fingerprint, cutoff],
                    |row| row.get(0),
                )
                .optional()?;

            let record = AlertRecord {
                alert_id: uuid::Uuid::new_v4().to_string(),
                event_id: decision.event_id,
                device_id: decision.device_id,
                fingerprint: decision.fingerprint,
                reason: decision.reason,
                risk_category: decision.risk_category,
                risk_score: decision.risk_score,
                delivery_status: if prior.is_some() {
                    DeliveryStatus::SuppressedDuplicate
                } else {
                    DeliveryStatus::Pending
                },
                attempts: 0,
                last_error: None,
                created_at: now,
                last_attempt_at: None,
            };

            tx.execute(
                "INSERT INTO alert_records (alert_id, event_id, device_id, fingerprint, reason,
                     risk_category, risk_score, delivery_status, attempts, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
                params![
                    record.alert_id,
                    record.event_id,
                    record.device_id,
                    record.fingerprint,
                    record.reason.to_string(),
                    record.risk_category.map(|c| c.to_string()),
                    record.risk_score,
                    record.delivery_status.to_string(),
                    format_ts(record.created_at),
                ],
            )?;
            tx.commit()?;
            Ok(RecordOutcome::Created(record))
        })
        .await
        .map_err(map_tr_err)
}

/// Writes attempt bookkeeping for an alert. Fails if the alert does not exist.
pub async fn update_delivery(db: &Database, update: &DeliveryUpdate) -> Result<(), ScamguardError> {
    let update = update.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE alert_records
                 SET delivery_status = ?2, attempts = ?3, last_attempt_at = ?4, last_error = ?5
                 WHERE alert_id = ?1",
                params![
                    update.alert_id,
                    update.status.to_string(),
                    update.attempts,
                    update.last_attempt_at.map(format_ts),
                    update.last_error,
                ],
            )?;
            if changed == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the alert recorded for an event.
pub async fn get_alert(db: &Database, event_id: &str) -> Result<Option<AlertRecord>, ScamguardError> {
    let event_id = event_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AlertRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {ALERT_COLUMNS} FROM alert_records WHERE event_id = ?1"),
                params![event_id],
                row_to_alert,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List alerts newest first, optionally filtered by status.
pub async fn list_alerts(
    db: &Database,
    status: Option<DeliveryStatus>,
    limit: u32,
) -> Result<Vec<AlertRecord>, ScamguardError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<AlertRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alert_records
                 WHERE (?1 IS NULL OR delivery_status = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2"
            ))?;
            let alerts = stmt
                .query_map(params![status, limit], row_to_alert)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(alerts)
        })
        .await
        .map_err(map_tr_err)
}

/// Alerts still awaiting delivery, oldest first.
pub async fn pending_alerts(db: &Database) -> Result<Vec<AlertRecord>, ScamguardError> {
    db.connection()
        .call(|conn| -> Result<Vec<AlertRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alert_records
                 WHERE delivery_status = 'pending'
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let alerts = stmt
                .query_map([], row_to_alert)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(alerts)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scamguard_core::types::{DecisionReason, RiskCategory};
    use tempfile::tempdir;

    async fn open_db(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("alerts.db");
        Database::open(path.to_str().unwrap(), true).await.unwrap()
    }

    fn decision(event_id: &str, device_id: &str, fingerprint: &str) -> AlertDecision {
        AlertDecision {
            event_id: event_id.to_string(),
            device_id: device_id.to_string(),
            fingerprint: fingerprint.to_string(),
            should_alert: true,
            reason: DecisionReason::ThresholdExceeded,
            risk_score: Some(0.93),
            risk_category: Some(RiskCategory::Fraud),
            decided_at: Utc::now(),
        }
    }

    fn window() -> TimeDelta {
        TimeDelta::seconds(300)
    }

    #[tokio::test]
    async fn record_creates_pending_alert() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;

        let outcome = record_decision(&db, &decision("e1", "d1", "fp1"), window())
            .await
            .unwrap();
        let RecordOutcome::Created(record) = outcome else {
            panic!("expected a new record");
        };
        assert_eq!(record.delivery_status, DeliveryStatus::Pending);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.risk_category, Some(RiskCategory::Fraud));

        let fetched = get_alert(&db, "e1").await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn record_is_idempotent_per_event() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;

        let first = record_decision(&db, &decision("e1", "d1", "fp1"), window())
            .await
            .unwrap()
            .into_record();
        let second = record_decision(&db, &decision("e1", "d1", "fp1"), window())
            .await
            .unwrap();

        assert!(second.is_duplicate());
        assert_eq!(second.record(), &first);
        assert_eq!(list_alerts(&db, None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_text_on_same_device_is_suppressed_within_window() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;

        record_decision(&db, &decision("e1", "d1", "fp1"), window())
            .await
            .unwrap();
        let repeat = record_decision(&db, &decision("e2", "d1", "fp1"), window())
            .await
            .unwrap()
            .into_record();
        assert_eq!(repeat.delivery_status, DeliveryStatus::SuppressedDuplicate);

        // Other devices and other texts are unaffected.
        let other_device = record_decision(&db, &decision("e3", "d2", "fp1"), window())
            .await
            .unwrap()
            .into_record();
        assert_eq!(other_device.delivery_status, DeliveryStatus::Pending);
        let other_text = record_decision(&db, &decision("e4", "d1", "fp2"), window())
            .await
            .unwrap()
            .into_record();
        assert_eq!(other_text.delivery_status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn failed_alert_does_not_suppress_a_repeat() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;

        let first = record_decision(&db, &decision("e1", "d1", "fp1"), window())
            .await
            .unwrap()
            .into_record();
        update_delivery(
            &db,
            &DeliveryUpdate {
                alert_id: first.alert_id,
                status: DeliveryStatus::Failed,
                attempts: 3,
                last_attempt_at: Some(Utc::now()),
                last_error: Some("network_error".into()),
            },
        )
        .await
        .unwrap();

        let repeat = record_decision(&db, &decision("e2", "d1", "fp1"), window())
            .await
            .unwrap()
            .into_record();
        assert_eq!(repeat.delivery_status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn zero_window_never_suppresses_older_alerts() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;

        record_decision(&db, &decision("e1", "d1", "fp1"), TimeDelta::zero())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let repeat = record_decision(&db, &decision("e2", "d1", "fp1"), TimeDelta::zero())
            .await
            .unwrap()
            .into_record();
        assert_eq!(repeat.delivery_status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn non_alerting_decision_is_rejected() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let mut quiet = decision("e1", "d1", "fp1");
        quiet.should_alert = false;
        quiet.reason = DecisionReason::BelowThreshold;

        let err = record_decision(&db, &quiet, window()).await.unwrap_err();
        assert!(matches!(err, ScamguardError::Validation(_)));
        assert!(get_alert(&db, "e1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_delivery_tracks_attempts() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let record = record_decision(&db, &decision("e1", "d1", "fp1"), window())
            .await
            .unwrap()
            .into_record();

        update_delivery(
            &db,
            &DeliveryUpdate {
                alert_id: record.alert_id.clone(),
                status: DeliveryStatus::Delivered,
                attempts: 2,
                last_attempt_at: Some(Utc::now()),
                last_error: None,
            },
        )
        .await
        .unwrap();

        let fetched = get_alert(&db, "e1").await.unwrap().unwrap();
        assert_eq!(fetched.delivery_status, DeliveryStatus::Delivered);
        assert_eq!(fetched.attempts, 2);
        assert!(fetched.last_attempt_at.is_some());
        assert!(pending_alerts(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_unknown_alert_fails() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        let err = update_delivery(
            &db,
            &DeliveryUpdate {
                alert_id: "missing".into(),
                status: DeliveryStatus::Failed,
                attempts: 1,
                last_attempt_at: Some(Utc::now()),
                last_error: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScamguardError::Storage { .. }));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir).await;
        record_decision(&db, &decision("e1", "d1", "fp1"), window())
            .await
            .unwrap();
        record_decision(&db, &decision("e2", "d1", "fp1"), window())
            .await
            .unwrap();

        let pending = list_alerts(&db, Some(DeliveryStatus::Pending), 10)
            .await
            .unwrap();
        let suppressed = list_alerts(&db, Some(DeliveryStatus::SuppressedDuplicate), 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(suppressed.len(), 1);
        assert_eq!(suppressed[0].event_id, "e2");
        assert_eq!(pending_alerts(&db).await.unwrap()[0].event_id, "e1");
    }
}
