// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device push-token lookup.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use scamguard_core::ScamguardError;

use super::format_ts;
use crate::database::{map_tr_err, Database};

pub async fn upsert_push_token(
    db: &Database,
    device_id: &str,
    push_token: &str,
) -> Result<(), ScamguardError> {
    let device_id = device_id.to_string();
    let push_token = push_token.to_string();
    let updated_at = format_ts(Utc::now());
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO device_push_tokens (device_id, push_token, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(device_id) DO UPDATE SET
                     push_token = excluded.push_token,
                     updated_at = excluded.updated_at",
                params![device_id, push_token, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes the device's token only if it still matches `push_token`, so a
/// registration that raced the provider's rejection survives.
pub async fn remove_push_token(
    db: &Database,
    device_id: &str,
    push_token: &str,
) -> Result<bool, ScamguardError> {
    let device_id = device_id.to_string();
    let push_token = push_token.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let removed = conn.execute(
                "DELETE FROM device_push_tokens WHERE device_id = ?1 AND push_token = ?2",
                params![device_id, push_token],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_push_token(db: &Database, device_id: &str) -> Result<Option<String>, ScamguardError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(
                "SELECT push_token FROM device_push_tokens WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
