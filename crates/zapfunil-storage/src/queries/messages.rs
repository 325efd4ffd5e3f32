// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and status operations.
//!
//! Messages are append-only. The gateway delivers events at-least-once, so
//! inserts are idempotent by external id, and delivery status only ever
//! moves forward in the pending -> sent -> delivered -> read ordering.

use rusqlite::params;
use tracing::debug;
use zapfunil_core::{DeliveryStatus, Direction, ZapfunilError};

use crate::database::{map_tr_err, Database};
use crate::models::{message_from_row, parse_enum, Message, MESSAGE_COLUMNS};

/// Append a message and refresh the owning conversation's snapshot, in one
/// transaction.
///
/// When `external_id` is present the insert is idempotent: a retried event
/// leaves the row and the snapshot untouched and returns `false`. The
/// snapshot only moves forward in time, and the unread counter bumps for
/// inbound messages only.
pub async fn append_message(db: &Database, msg: &Message) -> Result<bool, ZapfunilError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO messages (id, conversation_id, external_id, direction, kind,
                     content, media_url, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (external_id) WHERE external_id IS NOT NULL DO NOTHING",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.external_id,
                    msg.direction.to_string(),
                    msg.kind.to_string(),
                    msg.content,
                    msg.media_url,
                    msg.status.to_string(),
                    msg.created_at,
                ],
            )?;

            if inserted > 0 {
                let unread_bump = i64::from(msg.direction == Direction::Inbound);
                tx.execute(
                    "UPDATE conversations SET
                         last_message_content = ?1,
                         last_message_direction = ?2,
                         last_message_at = ?3,
                         unread_count = unread_count + ?4,
                         updated_at = ?5
                     WHERE id = ?6
                       AND (last_message_at IS NULL OR last_message_at <= ?3)",
                    params![
                        msg.content,
                        msg.direction.to_string(),
                        msg.created_at,
                        unread_bump,
                        crate::models::now_utc(),
                        msg.conversation_id,
                    ],
                )?;
            }

            tx.commit()?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Get messages for a conversation in chronological order.
pub async fn get_messages_for_conversation(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, ZapfunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            let base = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 ORDER BY created_at ASC"
            );
            match limit {
                Some(lim) => {
                    let sql = format!("{base} LIMIT ?2");
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![conversation_id, lim], message_from_row)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&base)?;
                    let rows = stmt.query_map(params![conversation_id], message_from_row)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Count messages in a conversation.
pub async fn count_messages(db: &Database, conversation_id: &str) -> Result<i64, ZapfunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a delivery-status update by external id.
///
/// Returns `true` if the update was applied. Regressions in the status
/// ordering and unknown external ids are ignored (`false`) -- a late
/// `delivered` after `read` must not rewind the message.
pub async fn update_status(
    db: &Database,
    external_id: &str,
    status: DeliveryStatus,
) -> Result<bool, ZapfunilError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let current: Option<(String, String)> = {
                let result = tx.query_row(
                    "SELECT id, status FROM messages WHERE external_id = ?1",
                    params![external_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                );
                match result {
                    Ok(pair) => Some(pair),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };

            let Some((id, current_raw)) = current else {
                tx.commit()?;
                debug!(external_id, "status update for unknown message ignored");
                return Ok(false);
            };

            let current_status: DeliveryStatus = parse_enum(1, current_raw)?;
            if status.rank() <= current_status.rank() {
                tx.commit()?;
                return Ok(false);
            }

            tx.execute(
                "UPDATE messages SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}
