// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity fixtures shared across crate test suites.

use zapfunil_core::types::{BotStep, Conversation};
use zapfunil_storage::models::now_utc;

/// A fresh conversation on the `central` instance / `Central` unit.
pub fn conversation_fixture(id: &str, phone: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        instance_id: "central".to_string(),
        remote_jid: format!("{phone}@s.whatsapp.net"),
        phone: phone.to_string(),
        display_name: Some("Contato".to_string()),
        unit: "Central".to_string(),
        lead_id: None,
        unread_count: 0,
        favorite: false,
        bot_enabled: None,
        last_message_content: None,
        last_message_direction: None,
        last_message_at: None,
        created_at: now_utc(),
        updated_at: now_utc(),
    }
}

/// A qualification step with an optional confirmation text.
pub fn step_fixture(key: &str, position: i64, question: &str, confirmation: Option<&str>) -> BotStep {
    BotStep {
        id: format!("step-{key}"),
        step_key: key.to_string(),
        position,
        question: question.to_string(),
        confirmation: confirmation.map(str::to_string),
        enabled: true,
    }
}
