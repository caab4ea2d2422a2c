// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification history.

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use scamguard_core::types::ClassificationResult;
use scamguard_core::ScamguardError;

use super::{format_ts, parse_enum, parse_ts};
use crate::database::{map_tr_err, Database};

/// Store a classification. A later classification of the same event replaces the earlier one.
pub async fn save_classification(
    db: &Database,
    result: &ClassificationResult,
) -> Result<(), ScamguardError> {
    let result = result.clone();
    let patterns = serde_json::to_string(&result.detected_patterns)
        .map_err(|e| ScamguardError::Internal(format!("encode detected patterns: {e}")))?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR REPLACE INTO classification_results
                     (event_id, risk_score, risk_category, model_version, patterns, explanation,
                      recommended_action, latency_ms, produced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    result.event_id,
                    result.risk_score,
                    result.risk_category.to_string(),
                    result.model_version,
                    patterns,
                    result.explanation,
                    result.recommended_action,
                    result.latency_ms as i64,
                    format_ts(result.produced_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the classification for an event.
pub async fn get_classification(
    db: &Database,
    event_id: &str,
) -> Result<Option<ClassificationResult>, ScamguardError> {
    let event_id = event_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ClassificationResult>, rusqlite::Error> {
            conn.query_row(
                "SELECT event_id, risk_score, risk_category, model_version, patterns, explanation,
                        recommended_action, latency_ms, produced_at
                 FROM classification_results WHERE event_id = ?1",
                params![event_id],
                |row| {
                    let category: String = row.get(2)?;
                    let patterns: String = row.get(4)?;
                    let latency_ms: i64 = row.get(7)?;
                    let produced_at: String = row.get(8)?;
                    Ok(ClassificationResult {
                        event_id: row.get(0)?,
                        risk_score: row.get(1)?,
                        risk_category: parse_enum(2, &category)?,
                        model_version: row.get(3)?,
                        detected_patterns: serde_json::from_str(&patterns).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
                        })?,
                        explanation: row.get(5)?,
                        recommended_action: row.get(6)?,
                        latency_ms: latency_ms.max(0) as u64,
                        produced_at: parse_ts(8, &produced_at)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, Utc};
    use scamguard_core::types::RiskCategory;
    use tempfile::tempdir;

    #[tokio::test]
    async fn classification_round_trip() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("c.db").to_str().unwrap(), true)
            .await
            .unwrap();
        let result = ClassificationResult {
            event_id: "e1".into(),
            risk_score: 0.42,
            risk_category: RiskCategory::Suspicious,
            model_version: "fraud-screen-v1".into(),
            detected_patterns: vec!["urgent transfer request".into()],
            explanation: Some("Asks for an immediate bank transfer.".into()),
            recommended_action: Some("stop the transfer".into()),
            latency_ms: 118,
            produced_at: Utc::now().trunc_subsecs(3),
        };

        save_classification(&db, &result).await.unwrap();
        assert_eq!(get_classification(&db, "e1").await.unwrap(), Some(result));
        assert_eq!(get_classification(&db, "nope").await.unwrap(), None);
    }
}
