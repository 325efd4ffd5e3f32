// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audited lead mutations.
//!
//! Status moves validate against the ordered status lane; adjacent moves
//! are no-ops at the ends. Regressions through `move_to` are permitted by
//! product design and produce their own history entries.

use rusqlite::params;
use tracing::{debug, info};
use uuid::Uuid;
use zapfunil_core::{Lead, LeadStatus, ZapfunilError};
use zapfunil_storage::database::map_tr_err;
use zapfunil_storage::models::{lead_from_row, now_utc, LEAD_COLUMNS};
use zapfunil_storage::queries::history::{actions, record_history};
use zapfunil_storage::Database;

/// Input for lead creation.
#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub name: String,
    /// Canonical digits-only phone.
    pub phone: String,
    pub unit: String,
    pub target_month: Option<String>,
    pub day_preference: Option<String>,
    pub guest_count: Option<i64>,
    pub notes: Option<String>,
    pub owner: Option<String>,
}

/// Create a lead in status `novo`, with its `lead_created` audit entry.
pub async fn create_lead(
    db: &Database,
    new: NewLead,
    actor: Option<&str>,
) -> Result<Lead, ZapfunilError> {
    let lead = Lead {
        id: Uuid::new_v4().to_string(),
        name: new.name,
        phone: new.phone,
        unit: new.unit,
        target_month: new.target_month,
        day_preference: new.day_preference,
        guest_count: new.guest_count,
        notes: new.notes,
        status: LeadStatus::Novo,
        owner: new.owner,
        created_at: now_utc(),
    };
    let actor = actor.map(str::to_string);
    let result = lead.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO leads (id, name, phone, unit, target_month, day_preference,
                     guest_count, notes, status, owner, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    lead.id,
                    lead.name,
                    lead.phone,
                    lead.unit,
                    lead.target_month,
                    lead.day_preference,
                    lead.guest_count,
                    lead.notes,
                    lead.status.to_string(),
                    lead.owner,
                    lead.created_at,
                ],
            )?;
            record_history(
                &tx,
                &lead.id,
                actor.as_deref(),
                actions::LEAD_CREATED,
                None,
                Some(&lead.name),
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    info!(lead_id = %result.id, unit = %result.unit, "lead created");
    Ok(result)
}

/// Move a lead to an explicit status, recording the transition.
///
/// Moving to the status the lead already occupies is a no-op and records
/// nothing -- there was no change to audit.
pub async fn move_to(
    db: &Database,
    lead_id: &str,
    new_status: LeadStatus,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    let lead_id_owned = lead_id.to_string();
    let actor = actor.map(str::to_string);
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = match tx.query_row(
                "SELECT status FROM leads WHERE id = ?1",
                params![lead_id_owned],
                |row| row.get(0),
            ) {
                Ok(s) => Some(s),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };

            let Some(old_status) = current else {
                tx.commit()?;
                return Ok(false);
            };

            let new_str = new_status.to_string();
            if old_status != new_str {
                record_history(
                    &tx,
                    &lead_id_owned,
                    actor.as_deref(),
                    actions::STATUS_CHANGED,
                    Some(&old_status),
                    Some(&new_str),
                )?;
                tx.execute(
                    "UPDATE leads SET status = ?1 WHERE id = ?2",
                    params![new_str, lead_id_owned],
                )?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if !found {
        return Err(ZapfunilError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        });
    }
    debug!(lead_id, status = %new_status, "lead status set");
    Ok(())
}

/// Advance one column in the linear lane. No-op at the end or off-lane.
pub async fn move_forward(
    db: &Database,
    lead_id: &str,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    adjacent_move(db, lead_id, actor, LeadStatus::next_linear).await
}

/// Step back one column in the linear lane. No-op at the start or off-lane.
pub async fn move_backward(
    db: &Database,
    lead_id: &str,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    adjacent_move(db, lead_id, actor, LeadStatus::prev_linear).await
}

async fn adjacent_move(
    db: &Database,
    lead_id: &str,
    actor: Option<&str>,
    step: fn(LeadStatus) -> Option<LeadStatus>,
) -> Result<(), ZapfunilError> {
    let lead = zapfunil_storage::queries::leads::get_lead(db, lead_id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        })?;
    match step(lead.status) {
        Some(next) => move_to(db, lead_id, next, actor).await,
        None => Ok(()),
    }
}

/// Hand a lead to another unit/owner: status `transferido` plus the new
/// assignment, one transition entry.
pub async fn transfer(
    db: &Database,
    lead_id: &str,
    new_unit: Option<&str>,
    new_owner: Option<&str>,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    let lead_id_owned = lead_id.to_string();
    let new_unit = new_unit.map(str::to_string);
    let new_owner = new_owner.map(str::to_string);
    let actor = actor.map(str::to_string);
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = match tx.query_row(
                "SELECT status FROM leads WHERE id = ?1",
                params![lead_id_owned],
                |row| row.get(0),
            ) {
                Ok(s) => Some(s),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };
            let Some(old_status) = current else {
                tx.commit()?;
                return Ok(false);
            };

            record_history(
                &tx,
                &lead_id_owned,
                actor.as_deref(),
                actions::STATUS_CHANGED,
                Some(&old_status),
                Some(&LeadStatus::Transferido.to_string()),
            )?;
            tx.execute(
                "UPDATE leads SET status = ?1,
                     unit = COALESCE(?2, unit),
                     owner = COALESCE(?3, owner)
                 WHERE id = ?4",
                params![
                    LeadStatus::Transferido.to_string(),
                    new_unit,
                    new_owner,
                    lead_id_owned
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if !found {
        return Err(ZapfunilError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        });
    }
    info!(lead_id, "lead transferred");
    Ok(())
}

/// Rename a lead, recording old and new names.
pub async fn rename(
    db: &Database,
    lead_id: &str,
    new_name: &str,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    audited_field_update(
        db,
        lead_id,
        actor,
        actions::NAME_CHANGED,
        "name",
        Some(new_name.to_string()),
    )
    .await
}

/// Update the free-text notes, recording old and new values.
pub async fn update_notes(
    db: &Database,
    lead_id: &str,
    notes: Option<&str>,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    audited_field_update(
        db,
        lead_id,
        actor,
        actions::NOTES_CHANGED,
        "notes",
        notes.map(str::to_string),
    )
    .await
}

async fn audited_field_update(
    db: &Database,
    lead_id: &str,
    actor: Option<&str>,
    action: &'static str,
    column: &'static str,
    new_value: Option<String>,
) -> Result<(), ZapfunilError> {
    let lead_id_owned = lead_id.to_string();
    let actor = actor.map(str::to_string);
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let sql = format!("SELECT {column} FROM leads WHERE id = ?1");
            let current: Option<Option<String>> =
                match tx.query_row(&sql, params![lead_id_owned], |row| row.get(0)) {
                    Ok(v) => Some(v),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                };
            let Some(old_value) = current else {
                tx.commit()?;
                return Ok(false);
            };

            record_history(
                &tx,
                &lead_id_owned,
                actor.as_deref(),
                action,
                old_value.as_deref(),
                new_value.as_deref(),
            )?;
            let sql = format!("UPDATE leads SET {column} = ?1 WHERE id = ?2");
            tx.execute(&sql, params![new_value, lead_id_owned])?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if !found {
        return Err(ZapfunilError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        });
    }
    Ok(())
}

/// Update the qualification fields (month, day preference, guest count) in
/// one audited write. Old and new values are JSON snapshots.
pub async fn update_qualification(
    db: &Database,
    lead_id: &str,
    target_month: Option<&str>,
    day_preference: Option<&str>,
    guest_count: Option<i64>,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    let lead_id_owned = lead_id.to_string();
    let target_month = target_month.map(str::to_string);
    let day_preference = day_preference.map(str::to_string);
    let actor = actor.map(str::to_string);
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1");
            let current = {
                let mut stmt = tx.prepare(&sql)?;
                match stmt.query_row(params![lead_id_owned], lead_from_row) {
                    Ok(lead) => Some(lead),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };
            let Some(lead) = current else {
                tx.commit()?;
                return Ok(false);
            };

            let old_snapshot = serde_json::json!({
                "mes": lead.target_month,
                "dia": lead.day_preference,
                "convidados": lead.guest_count,
            })
            .to_string();
            let new_snapshot = serde_json::json!({
                "mes": target_month,
                "dia": day_preference,
                "convidados": guest_count,
            })
            .to_string();

            record_history(
                &tx,
                &lead_id_owned,
                actor.as_deref(),
                actions::QUALIFICATION_CHANGED,
                Some(&old_snapshot),
                Some(&new_snapshot),
            )?;
            tx.execute(
                "UPDATE leads SET target_month = ?1, day_preference = ?2, guest_count = ?3
                 WHERE id = ?4",
                params![target_month, day_preference, guest_count, lead_id_owned],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if !found {
        return Err(ZapfunilError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        });
    }
    Ok(())
}

/// Delete a lead and everything referencing it as one logical operation:
/// history entries and armed follow-ups go first so no audit record ever
/// dangles, and linked conversations drop their weak reference.
pub async fn delete_lead(db: &Database, lead_id: &str) -> Result<(), ZapfunilError> {
    let lead_id_owned = lead_id.to_string();
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM lead_history WHERE lead_id = ?1",
                params![lead_id_owned],
            )?;
            tx.execute(
                "DELETE FROM followups WHERE lead_id = ?1",
                params![lead_id_owned],
            )?;
            tx.execute(
                "UPDATE conversations SET lead_id = NULL WHERE lead_id = ?1",
                params![lead_id_owned],
            )?;
            let deleted = tx.execute("DELETE FROM leads WHERE id = ?1", params![lead_id_owned])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)?;

    if !found {
        return Err(ZapfunilError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        });
    }
    info!(lead_id, "lead deleted");
    Ok(())
}
