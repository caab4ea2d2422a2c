// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode and migrations.
//!
//! All reads and writes are serialized through tokio-rusqlite's single
//! background thread. That thread is the mutual-exclusion point the alert
//! store's idempotency relies on, so never open a second connection for writes.

use std::path::Path;

use scamguard_core::ScamguardError;
use tracing::debug;

use crate::migrations;

/// Handle to the single SQLite writer connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and applies migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, ScamguardError> {
        let owned = path.to_string();
        // Migrations run on a plain connection before the writer thread takes over the file.
        tokio::task::spawn_blocking(move || prepare_file(&owned, wal_mode))
            .await
            .map_err(|e| ScamguardError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ScamguardError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection. Query modules go through `call()`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flushes the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ScamguardError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

fn prepare_file(path: &str, wal_mode: bool) -> Result<(), ScamguardError> {
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(ScamguardError::storage)?;
    }

    let mut conn = rusqlite::Connection::open(path).map_err(ScamguardError::storage)?;
    if wal_mode {
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(ScamguardError::storage)?;
        debug!(journal_mode = %mode, "journal mode set");
    }
    migrations::run_migrations(&mut conn)
}

/// Converts a tokio-rusqlite call error into a storage error.
pub(crate) fn map_tr_err<E>(err: E) -> ScamguardError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ScamguardError::storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_parent_directories_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/alerts.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'refinery%' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();
        assert_eq!(
            tables,
            vec!["alert_records", "classification_results", "device_push_tokens"]
        );
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();
        let first = Database::open(path, true).await.unwrap();
        first.checkpoint().await.unwrap();
        drop(first);
        Database::open(path, true).await.unwrap();
    }
}
