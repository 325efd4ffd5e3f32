// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot configuration and session state operations.
//!
//! Settings and steps are owned by the settings collaborator; the core
//! reads them. Sessions are the per-conversation qualification state --
//! an explicit record keyed by conversation id, so any process instance
//! can resume a dialog.

use rusqlite::params;
use zapfunil_core::ZapfunilError;

use crate::database::{map_tr_err, Database};
use crate::models::{session_from_row, BotSession, BotSettings, BotStep};

/// Read the settings singleton (seeded by migration).
pub async fn get_settings(db: &Database) -> Result<BotSettings, ZapfunilError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT enabled, test_number, existing_customer_pattern, completion_message,
                        transfer_message, menu_message, auto_send_materials, material_delay_secs,
                        followup_stage2_enabled, followup_delay1_hours, followup_delay2_hours,
                        followup_template1, followup_template2
                 FROM bot_settings WHERE id = 1",
                [],
                |row| {
                    Ok(BotSettings {
                        enabled: row.get(0)?,
                        test_number: row.get(1)?,
                        existing_customer_pattern: row.get(2)?,
                        completion_message: row.get(3)?,
                        transfer_message: row.get(4)?,
                        menu_message: row.get(5)?,
                        auto_send_materials: row.get(6)?,
                        material_delay_secs: row.get::<_, i64>(7)?.max(0) as u64,
                        followup_stage2_enabled: row.get(8)?,
                        followup_delay1_hours: row.get(9)?,
                        followup_delay2_hours: row.get(10)?,
                        followup_template1: row.get(11)?,
                        followup_template2: row.get(12)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the settings singleton (settings surface and tests).
pub async fn save_settings(db: &Database, settings: &BotSettings) -> Result<(), ZapfunilError> {
    let s = settings.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE bot_settings SET enabled = ?1, test_number = ?2,
                     existing_customer_pattern = ?3, completion_message = ?4,
                     transfer_message = ?5, menu_message = ?6, auto_send_materials = ?7,
                     material_delay_secs = ?8, followup_stage2_enabled = ?9,
                     followup_delay1_hours = ?10, followup_delay2_hours = ?11,
                     followup_template1 = ?12, followup_template2 = ?13
                 WHERE id = 1",
                params![
                    s.enabled,
                    s.test_number,
                    s.existing_customer_pattern,
                    s.completion_message,
                    s.transfer_message,
                    s.menu_message,
                    s.auto_send_materials,
                    s.material_delay_secs as i64,
                    s.followup_stage2_enabled,
                    s.followup_delay1_hours,
                    s.followup_delay2_hours,
                    s.followup_template1,
                    s.followup_template2,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List steps ordered by position. With `enabled_only`, disabled steps are
/// skipped -- the active question sequence.
pub async fn list_steps(db: &Database, enabled_only: bool) -> Result<Vec<BotStep>, ZapfunilError> {
    db.connection()
        .call(move |conn| {
            let sql = if enabled_only {
                "SELECT id, step_key, position, question, confirmation, enabled
                 FROM bot_steps WHERE enabled = 1 ORDER BY position ASC"
            } else {
                "SELECT id, step_key, position, question, confirmation, enabled
                 FROM bot_steps ORDER BY position ASC"
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([], |row| {
                Ok(BotStep {
                    id: row.get(0)?,
                    step_key: row.get(1)?,
                    position: row.get(2)?,
                    question: row.get(3)?,
                    confirmation: row.get(4)?,
                    enabled: row.get(5)?,
                })
            })?;
            let mut steps = Vec::new();
            for row in rows {
                steps.push(row?);
            }
            Ok(steps)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace a step by key (settings surface and tests).
pub async fn save_step(db: &Database, step: &BotStep) -> Result<(), ZapfunilError> {
    let s = step.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bot_steps (id, step_key, position, question, confirmation, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (step_key) DO UPDATE SET
                     position = excluded.position,
                     question = excluded.question,
                     confirmation = excluded.confirmation,
                     enabled = excluded.enabled",
                params![s.id, s.step_key, s.position, s.question, s.confirmation, s.enabled],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get the qualification session for a conversation.
pub async fn get_session(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<BotSession>, ZapfunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT conversation_id, current_step, answers, existing_customer,
                        created_at, updated_at
                 FROM bot_sessions WHERE conversation_id = ?1",
                params![conversation_id],
                session_from_row,
            );
            match result {
                Ok(s) => Ok(Some(s)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace the session for a conversation.
///
/// The bot engine calls this only after the sends for a transition have
/// succeeded, so a failed send never advances the step pointer.
pub async fn put_session(db: &Database, session: &BotSession) -> Result<(), ZapfunilError> {
    let s = session.clone();
    let answers_json = serde_json::Value::Object(s.answers.clone()).to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bot_sessions (conversation_id, current_step, answers,
                     existing_customer, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (conversation_id) DO UPDATE SET
                     current_step = excluded.current_step,
                     answers = excluded.answers,
                     existing_customer = excluded.existing_customer,
                     updated_at = excluded.updated_at",
                params![
                    s.conversation_id,
                    s.current_step,
                    answers_json,
                    s.existing_customer,
                    s.created_at,
                    s.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a session (completion, transfer, or bypass).
pub async fn delete_session(db: &Database, conversation_id: &str) -> Result<(), ZapfunilError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM bot_sessions WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Whether a phone is exempt from all bot automation.
pub async fn is_vip(db: &Database, phone: &str) -> Result<bool, ZapfunilError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM vip_numbers WHERE phone = ?1",
                params![phone],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Add a phone to the VIP/opt-out list. Idempotent.
pub async fn add_vip(db: &Database, phone: &str, note: Option<&str>) -> Result<(), ZapfunilError> {
    let phone = phone.to_string();
    let note = note.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO vip_numbers (phone, note, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (phone) DO NOTHING",
                params![phone, note, crate::models::now_utc()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove a phone from the VIP/opt-out list.
pub async fn remove_vip(db: &Database, phone: &str) -> Result<(), ZapfunilError> {
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM vip_numbers WHERE phone = ?1", params![phone])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
