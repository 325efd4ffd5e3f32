// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared audit/history primitive.
//!
//! Every mutating component (bot, linker, pipeline, follow-up) writes
//! through [`record_history`]. It takes the open connection or transaction
//! of the surrounding operation so the audit row and the mutation commit
//! together -- this is the system's only durable log, and its completeness
//! is a correctness requirement.

use rusqlite::params;
use zapfunil_core::ZapfunilError;

use crate::database::{map_tr_err, Database};
use crate::models::{history_from_row, LeadHistoryEntry, HISTORY_COLUMNS};

/// Well-known action labels written by the core components.
pub mod actions {
    pub const LEAD_CREATED: &str = "lead_created";
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const NAME_CHANGED: &str = "name_changed";
    pub const NOTES_CHANGED: &str = "notes_changed";
    pub const QUALIFICATION_CHANGED: &str = "qualification_changed";
    pub const CONVERSATION_LINKED: &str = "conversation_linked";
    pub const CONVERSATION_UNLINKED: &str = "conversation_unlinked";
    pub const VISIT_REQUESTED: &str = "visit_requested";
    pub const HUMAN_REQUESTED: &str = "human_requested";
    pub const FOLLOWUP_ARMED: &str = "followup_armed";
    pub const FOLLOWUP_STAGE1_SENT: &str = "followup_stage1_sent";
    pub const FOLLOWUP_STAGE2_SENT: &str = "followup_stage2_sent";
}

/// Append one audit entry on the caller's connection.
///
/// Synchronous on purpose: callers run it inside the same transaction as
/// the mutation it describes, so both commit or neither does.
pub fn record_history(
    conn: &rusqlite::Connection,
    lead_id: &str,
    actor: Option<&str>,
    action: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO lead_history (lead_id, actor, action, old_value, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            lead_id,
            actor,
            action,
            old_value,
            new_value,
            crate::models::now_utc()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the full history of a lead, oldest first.
pub async fn get_history(
    db: &Database,
    lead_id: &str,
) -> Result<Vec<LeadHistoryEntry>, ZapfunilError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {HISTORY_COLUMNS} FROM lead_history
                 WHERE lead_id = ?1 ORDER BY id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![lead_id], history_from_row)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Whether the lead has at least one entry with the given action.
///
/// The follow-up scheduler uses this as its de-duplication guard.
pub async fn has_action(
    db: &Database,
    lead_id: &str,
    action: &str,
) -> Result<bool, ZapfunilError> {
    let lead_id = lead_id.to_string();
    let action = action.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM lead_history WHERE lead_id = ?1 AND action = ?2",
                params![lead_id, action],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}
