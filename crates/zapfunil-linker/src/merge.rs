// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duplicate conversation detection and merge.
//!
//! One conversation per (instance, canonical phone) is the invariant;
//! duplicates are an anomaly to detect and correct, never steady state.
//! Merge runs one transaction per secondary: reassign its messages, fold
//! its unread count, drop its session and row. A failed reassignment
//! aborts that secondary before its conversation row is removed, so
//! messages are never orphaned and a partial merge is safe to retry.

use rusqlite::params;
use tracing::info;
use zapfunil_core::ZapfunilError;
use zapfunil_storage::database::map_tr_err;
use zapfunil_storage::queries::conversations;
use zapfunil_storage::Database;

/// Conversations sharing one canonical phone on one instance.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub instance_id: String,
    pub phone: String,
    /// Conversation ids, oldest first. The first is the natural primary.
    pub conversation_ids: Vec<String>,
}

/// Group conversations by (instance, canonical phone) and return the
/// groups with more than one member.
pub async fn detect_duplicates(db: &Database) -> Result<Vec<DuplicateGroup>, ZapfunilError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT instance_id, phone, GROUP_CONCAT(id) FROM (
                     SELECT instance_id, phone, id FROM conversations ORDER BY created_at ASC
                 )
                 GROUP BY instance_id, phone
                 HAVING COUNT(*) > 1
                 ORDER BY instance_id, phone",
            )?;
            let rows = stmt.query_map([], |row| {
                let ids: String = row.get(2)?;
                Ok(DuplicateGroup {
                    instance_id: row.get(0)?,
                    phone: row.get(1)?,
                    conversation_ids: ids.split(',').map(str::to_string).collect(),
                })
            })?;
            let mut groups = Vec::new();
            for row in rows {
                groups.push(row?);
            }
            Ok(groups)
        })
        .await
        .map_err(map_tr_err)
}

/// Collapse secondary conversations into the primary.
///
/// Message timestamps are preserved; the primary's last-message snapshot
/// is recomputed from the merged set afterwards. Each secondary is an
/// all-or-nothing unit.
pub async fn merge(
    db: &Database,
    primary_id: &str,
    secondary_ids: &[String],
) -> Result<(), ZapfunilError> {
    conversations::get_conversation(db, primary_id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "conversation",
            id: primary_id.to_string(),
        })?;

    for secondary_id in secondary_ids {
        if secondary_id == primary_id {
            continue;
        }
        absorb_secondary(db, primary_id, secondary_id).await?;
    }

    recompute_snapshot(db, primary_id).await?;
    info!(
        primary_id,
        merged = secondary_ids.len(),
        "conversations merged"
    );
    Ok(())
}

/// Move one secondary's messages into the primary and delete it, in one
/// transaction.
async fn absorb_secondary(
    db: &Database,
    primary_id: &str,
    secondary_id: &str,
) -> Result<(), ZapfunilError> {
    let primary_id = primary_id.to_string();
    let secondary_id = secondary_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let unread: i64 = match tx.query_row(
                "SELECT unread_count FROM conversations WHERE id = ?1",
                params![secondary_id],
                |row| row.get(0),
            ) {
                Ok(u) => u,
                // Already absorbed by an earlier, interrupted merge run.
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            tx.execute(
                "UPDATE messages SET conversation_id = ?1 WHERE conversation_id = ?2",
                params![primary_id, secondary_id],
            )?;
            tx.execute(
                "DELETE FROM bot_sessions WHERE conversation_id = ?1",
                params![secondary_id],
            )?;
            tx.execute(
                "UPDATE conversations SET unread_count = unread_count + ?1, updated_at = ?2
                 WHERE id = ?3",
                params![unread, zapfunil_storage::models::now_utc(), primary_id],
            )?;
            tx.execute(
                "DELETE FROM conversations WHERE id = ?1",
                params![secondary_id],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Recompute the primary's last-message snapshot from its merged message
/// set, ordered by timestamp descending.
async fn recompute_snapshot(db: &Database, conversation_id: &str) -> Result<(), ZapfunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let latest: Option<(String, String, String)> = match conn.query_row(
                "SELECT content, direction, created_at FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC LIMIT 1",
                params![conversation_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            ) {
                Ok(m) => Some(m),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };

            match latest {
                Some((content, direction, created_at)) => {
                    conn.execute(
                        "UPDATE conversations SET last_message_content = ?1,
                             last_message_direction = ?2, last_message_at = ?3, updated_at = ?4
                         WHERE id = ?5",
                        params![
                            content,
                            direction,
                            created_at,
                            zapfunil_storage::models::now_utc(),
                            conversation_id
                        ],
                    )?;
                }
                None => {
                    conn.execute(
                        "UPDATE conversations SET last_message_content = NULL,
                             last_message_direction = NULL, last_message_at = NULL,
                             updated_at = ?1
                         WHERE id = ?2",
                        params![zapfunil_storage::models::now_utc(), conversation_id],
                    )?;
                }
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
