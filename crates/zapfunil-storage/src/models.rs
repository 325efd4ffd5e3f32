// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types and row mappers for storage entities.
//!
//! The canonical types are defined in `zapfunil-core::types` for use across
//! crate boundaries; this module re-exports them and provides the shared
//! row-mapping helpers used by query modules here and by the domain crates
//! that run their own transactions against the single writer.

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;

pub use zapfunil_core::types::{
    BotSession, BotSettings, BotStep, Conversation, DeliveryStatus, Direction, Followup, Lead,
    LeadHistoryEntry, LeadStatus, Message, MessageKind,
};

/// Current UTC timestamp in the stored RFC 3339 millisecond format.
pub fn now_utc() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse a strum-backed enum column, surfacing failures as rusqlite
/// conversion errors so they propagate through `call` unchanged.
pub(crate) fn parse_enum<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a `SELECT * FROM conversations` row in schema column order.
pub fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let last_direction: Option<String> = row.get(12)?;
    Ok(Conversation {
        id: row.get(0)?,
        instance_id: row.get(1)?,
        remote_jid: row.get(2)?,
        phone: row.get(3)?,
        display_name: row.get(4)?,
        unit: row.get(5)?,
        lead_id: row.get(6)?,
        unread_count: row.get(7)?,
        favorite: row.get(8)?,
        bot_enabled: row.get(9)?,
        last_message_content: row.get(10)?,
        last_message_direction: last_direction
            .map(|d| parse_enum(12, d))
            .transpose()?,
        last_message_at: row.get(11)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Column list matching [`conversation_from_row`].
pub const CONVERSATION_COLUMNS: &str = "id, instance_id, remote_jid, phone, display_name, unit, \
     lead_id, unread_count, favorite, bot_enabled, last_message_content, last_message_at, \
     last_message_direction, created_at, updated_at";

/// Map a messages row in [`MESSAGE_COLUMNS`] order.
pub fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        external_id: row.get(2)?,
        direction: parse_enum(3, row.get::<_, String>(3)?)?,
        kind: parse_enum(4, row.get::<_, String>(4)?)?,
        content: row.get(5)?,
        media_url: row.get(6)?,
        status: parse_enum(7, row.get::<_, String>(7)?)?,
        created_at: row.get(8)?,
    })
}

/// Column list matching [`message_from_row`].
pub const MESSAGE_COLUMNS: &str =
    "id, conversation_id, external_id, direction, kind, content, media_url, status, created_at";

/// Map a leads row in [`LEAD_COLUMNS`] order.
pub fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        unit: row.get(3)?,
        target_month: row.get(4)?,
        day_preference: row.get(5)?,
        guest_count: row.get(6)?,
        notes: row.get(7)?,
        status: parse_enum(8, row.get::<_, String>(8)?)?,
        owner: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Column list matching [`lead_from_row`].
pub const LEAD_COLUMNS: &str =
    "id, name, phone, unit, target_month, day_preference, guest_count, notes, status, owner, \
     created_at";

/// Map a lead_history row in [`HISTORY_COLUMNS`] order.
pub fn history_from_row(row: &Row<'_>) -> rusqlite::Result<LeadHistoryEntry> {
    Ok(LeadHistoryEntry {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        actor: row.get(2)?,
        action: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Column list matching [`history_from_row`].
pub const HISTORY_COLUMNS: &str =
    "id, lead_id, actor, action, old_value, new_value, created_at";

/// Map a bot_sessions row in schema order, decoding the answers JSON.
pub fn session_from_row(row: &Row<'_>) -> rusqlite::Result<BotSession> {
    let answers_raw: String = row.get(2)?;
    let answers: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&answers_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(BotSession {
        conversation_id: row.get(0)?,
        current_step: row.get(1)?,
        answers,
        existing_customer: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
