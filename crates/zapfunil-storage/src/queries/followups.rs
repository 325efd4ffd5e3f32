// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Armed follow-up records.
//!
//! Only the arming event lives here. Which stages were sent is recorded in
//! lead history (`followup_stageN_sent`), written after confirmed dispatch.

use rusqlite::params;
use zapfunil_core::{Followup, ZapfunilError};

use crate::database::{map_tr_err, Database};

/// Arm a follow-up for a lead. Returns `true` if this was a new arming.
///
/// Idempotent: re-arming keeps the original `armed_at`, so stage timing is
/// always measured from the first arming event.
pub async fn arm(db: &Database, lead_id: &str, armed_at: &str) -> Result<bool, ZapfunilError> {
    let lead_id = lead_id.to_string();
    let armed_at = armed_at.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO followups (lead_id, armed_at) VALUES (?1, ?2)
                 ON CONFLICT (lead_id) DO NOTHING",
                params![lead_id, armed_at],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Get the armed follow-up for a lead, if any.
pub async fn get(db: &Database, lead_id: &str) -> Result<Option<Followup>, ZapfunilError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT lead_id, armed_at FROM followups WHERE lead_id = ?1",
                params![lead_id],
                |row| {
                    Ok(Followup {
                        lead_id: row.get(0)?,
                        armed_at: row.get(1)?,
                    })
                },
            );
            match result {
                Ok(f) => Ok(Some(f)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List every armed follow-up, oldest arming first.
pub async fn list_armed(db: &Database) -> Result<Vec<Followup>, ZapfunilError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT lead_id, armed_at FROM followups ORDER BY armed_at ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok(Followup {
                    lead_id: row.get(0)?,
                    armed_at: row.get(1)?,
                })
            })?;
            let mut followups = Vec::new();
            for row in rows {
                followups.push(row?);
            }
            Ok(followups)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove the armed record (lead deletion).
pub async fn disarm(db: &Database, lead_id: &str) -> Result<(), ZapfunilError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM followups WHERE lead_id = ?1", params![lead_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
