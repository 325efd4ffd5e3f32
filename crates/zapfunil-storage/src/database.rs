// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread -- the `Database` struct IS the single writer. Query modules
//! accept `&Database` and call through `conn.call()`. Do NOT create
//! additional Connection instances for writes.
//!
//! Multi-statement invariants (audit + mutation, merge) run inside explicit
//! transactions within one `call` closure, so racing callers cannot
//! interleave read-before-write sequences on the same row.

use std::time::Duration;

use rusqlite::hooks::Action;
use tokio::sync::broadcast;
use tracing::debug;
use zapfunil_core::ZapfunilError;

use crate::feed::{ChangeEvent, ChangeOp};
use crate::migrations;

/// Capacity of the change-feed broadcast channel. Slow subscribers lag and
/// receive `RecvError::Lagged`, they never block the writer.
const FEED_CAPACITY: usize = 256;

/// Handle to the single-writer SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    feed: broadcast::Sender<ChangeEvent>,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled.
    pub async fn open(path: &str) -> Result<Self, ZapfunilError> {
        Self::open_with_options(path, true).await
    }

    /// Open (or create) the database at `path`.
    ///
    /// Runs migrations on a short-lived blocking connection before the
    /// async connection takes over as the single writer, then installs
    /// the update hook feeding the change broadcast.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, ZapfunilError> {
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), ZapfunilError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(ZapfunilError::storage)?;
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")
                    .map_err(ZapfunilError::storage)?;
            }
            migrations::run_migrations(&mut conn)?;
            Ok(())
        })
        .await
        .map_err(|e| ZapfunilError::Internal(format!("migration task panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ZapfunilError::storage)?;

        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        let hook_feed = feed.clone();
        conn.call(move |conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(Duration::from_millis(5000))?;
            conn.update_hook(Some(
                move |action: Action, _db: &str, table: &str, rowid: i64| {
                    let op = match action {
                        Action::SQLITE_INSERT => ChangeOp::Insert,
                        Action::SQLITE_UPDATE => ChangeOp::Update,
                        Action::SQLITE_DELETE => ChangeOp::Delete,
                        _ => return,
                    };
                    // No receivers is fine; the feed is best-effort.
                    let _ = hook_feed.send(ChangeEvent {
                        table: table.to_string(),
                        op,
                        rowid,
                    });
                },
            ));
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn, feed })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Subscribe to the row-level change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Close the database, flushing the background thread.
    pub async fn close(self) -> Result<(), ZapfunilError> {
        self.conn
            .close()
            .await
            .map_err(|e| ZapfunilError::Internal(format!("failed to close database: {e}")))
    }
}

/// Map a tokio-rusqlite error into the crate error type.
pub fn map_tr_err(err: tokio_rusqlite::Error) -> ZapfunilError {
    ZapfunilError::Storage {
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeOp;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_runs_migrations() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        // The seeded bot_settings singleton proves the schema exists.
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM bot_settings", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Second open must not re-apply migrations.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn change_feed_reports_inserts() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let mut rx = db.subscribe();
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO vip_numbers (phone, note, created_at)
                     VALUES ('5511999990000', NULL, '2026-01-01T00:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, "vip_numbers");
        assert_eq!(event.op, ChangeOp::Insert);

        db.close().await.unwrap();
    }
}
