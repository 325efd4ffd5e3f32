// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain entity types shared across the Zapfunil workspace.
//!
//! The storage crate persists these shapes; enum-valued columns store the
//! strum string forms. Timestamps are RFC 3339 UTC strings.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Direction of a message relative to the business.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// From the contact to the business.
    Inbound,
    /// From the business to the contact.
    Outbound,
}

/// Payload kind of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
}

/// Delivery status of an outbound message. Moves strictly forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Position in the pending -> sent -> delivered -> read ordering.
    /// Status updates that would lower the rank are rejected by storage.
    pub fn rank(self) -> u8 {
        match self {
            DeliveryStatus::Pending => 0,
            DeliveryStatus::Sent => 1,
            DeliveryStatus::Delivered => 2,
            DeliveryStatus::Read => 3,
        }
    }
}

/// Sales pipeline status of a lead, in fixed column order.
///
/// `Fechado` and `Perdido` are terminal and reachable from any prior status
/// by explicit user action. `Transferido` marks a lead handed to another
/// unit or owner and sits outside the linear forward/back navigation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Novo,
    EmContato,
    OrcamentoEnviado,
    AguardandoResposta,
    Fechado,
    Perdido,
    Transferido,
}

impl LeadStatus {
    /// Every status, in display/column order.
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::Novo,
        LeadStatus::EmContato,
        LeadStatus::OrcamentoEnviado,
        LeadStatus::AguardandoResposta,
        LeadStatus::Fechado,
        LeadStatus::Perdido,
        LeadStatus::Transferido,
    ];

    /// The linear subsequence navigated by adjacent moves.
    pub const LINEAR: [LeadStatus; 4] = [
        LeadStatus::Novo,
        LeadStatus::EmContato,
        LeadStatus::OrcamentoEnviado,
        LeadStatus::AguardandoResposta,
    ];

    /// Next status in the linear lane, or `None` at the end or off-lane.
    pub fn next_linear(self) -> Option<LeadStatus> {
        let idx = Self::LINEAR.iter().position(|s| *s == self)?;
        Self::LINEAR.get(idx + 1).copied()
    }

    /// Previous status in the linear lane, or `None` at the start or off-lane.
    pub fn prev_linear(self) -> Option<LeadStatus> {
        let idx = Self::LINEAR.iter().position(|s| *s == self)?;
        idx.checked_sub(1).and_then(|i| Self::LINEAR.get(i).copied())
    }

    /// Whether this status ends the pipeline.
    pub fn is_terminal(self) -> bool {
        matches!(self, LeadStatus::Fechado | LeadStatus::Perdido)
    }
}

/// One chat thread with a contact on one messaging instance.
///
/// Invariant: at most one conversation per (instance, canonical phone).
/// Duplicates are a detected anomaly resolved by the linker's merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub instance_id: String,
    /// Remote address on the messaging platform, unique per instance.
    pub remote_jid: String,
    /// Canonical digits-only phone.
    pub phone: String,
    pub display_name: Option<String>,
    /// Venue unit, denormalized from instance config at creation.
    pub unit: String,
    /// Weak reference to a lead; lookup only, no ownership.
    pub lead_id: Option<String>,
    pub unread_count: i64,
    pub favorite: bool,
    /// Per-conversation bot override. `None` follows the instance policy.
    pub bot_enabled: Option<bool>,
    pub last_message_content: Option<String>,
    pub last_message_direction: Option<Direction>,
    pub last_message_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable message event, inbound or outbound. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    /// Provider message id; used for idempotent upsert when present.
    pub external_id: Option<String>,
    pub direction: Direction,
    pub kind: MessageKind,
    pub content: String,
    pub media_url: Option<String>,
    pub status: DeliveryStatus,
    pub created_at: String,
}

/// A qualified sales prospect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    /// Canonical digits-only phone.
    pub phone: String,
    pub unit: String,
    pub target_month: Option<String>,
    pub day_preference: Option<String>,
    pub guest_count: Option<i64>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub owner: Option<String>,
    pub created_at: String,
}

/// Append-only audit record for a lead mutation.
///
/// `actor` is `None` for system/bot actions. Written atomically with the
/// mutation it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadHistoryEntry {
    pub id: i64,
    pub lead_id: String,
    pub actor: Option<String>,
    pub action: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: String,
}

/// In-progress state of the scripted qualification dialog for a conversation.
///
/// `current_step` is a step key from the configured sequence, or the
/// sentinel `"menu"` once the completion message has been sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSession {
    pub conversation_id: String,
    pub current_step: String,
    /// Collected answers keyed by step key, as a JSON object.
    pub answers: serde_json::Map<String, serde_json::Value>,
    pub existing_customer: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Sentinel step key for the post-completion next-step menu.
pub const MENU_STEP: &str = "menu";

/// One administrator-configured qualification step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStep {
    pub id: String,
    pub step_key: String,
    pub position: i64,
    pub question: String,
    /// Optional confirmation sent after the answer; may interpolate
    /// `{{resposta}}` and earlier answers by key.
    pub confirmation: Option<String>,
    pub enabled: bool,
}

/// Administrator-owned bot settings. Read-only to the core; singleton row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    pub enabled: bool,
    /// When set, the bot also processes this number even while disabled.
    pub test_number: Option<String>,
    /// Case-insensitive regex classifying "existing customer" replies.
    pub existing_customer_pattern: String,
    pub completion_message: Option<String>,
    pub transfer_message: Option<String>,
    pub menu_message: Option<String>,
    pub auto_send_materials: bool,
    pub material_delay_secs: u64,
    pub followup_stage2_enabled: bool,
    pub followup_delay1_hours: i64,
    pub followup_delay2_hours: i64,
    pub followup_template1: Option<String>,
    pub followup_template2: Option<String>,
}

/// An armed follow-up for a lead that chose "analyze later."
///
/// Stage de-duplication lives in lead history, not here: the
/// `followup_stageN_sent` entry is the guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Followup {
    pub lead_id: String,
    pub armed_at: String,
}

/// Inbound event contract delivered by the messaging gateway webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub instance_id: String,
    pub remote_jid: String,
    /// Canonical digits-only contact phone.
    pub contact_phone: String,
    pub display_name: Option<String>,
    pub direction: Direction,
    pub kind: MessageKind,
    pub content: String,
    pub media_url: Option<String>,
    pub external_id: Option<String>,
    /// Present on delivery-status update events.
    pub status: Option<DeliveryStatus>,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lead_status_strings_match_column_names() {
        assert_eq!(LeadStatus::Novo.to_string(), "novo");
        assert_eq!(LeadStatus::EmContato.to_string(), "em_contato");
        assert_eq!(LeadStatus::OrcamentoEnviado.to_string(), "orcamento_enviado");
        assert_eq!(
            LeadStatus::AguardandoResposta.to_string(),
            "aguardando_resposta"
        );
        assert_eq!(LeadStatus::Fechado.to_string(), "fechado");
        assert_eq!(LeadStatus::Perdido.to_string(), "perdido");
        assert_eq!(LeadStatus::Transferido.to_string(), "transferido");
    }

    #[test]
    fn linear_navigation_stops_at_ends() {
        assert_eq!(LeadStatus::Novo.prev_linear(), None);
        assert_eq!(LeadStatus::Novo.next_linear(), Some(LeadStatus::EmContato));
        assert_eq!(
            LeadStatus::AguardandoResposta.next_linear(),
            None,
            "forward move is a no-op at the end of the lane"
        );
        assert_eq!(
            LeadStatus::AguardandoResposta.prev_linear(),
            Some(LeadStatus::OrcamentoEnviado)
        );
    }

    #[test]
    fn terminal_and_transfer_statuses_are_off_lane() {
        for s in [LeadStatus::Fechado, LeadStatus::Perdido, LeadStatus::Transferido] {
            assert_eq!(s.next_linear(), None);
            assert_eq!(s.prev_linear(), None);
        }
        assert!(LeadStatus::Fechado.is_terminal());
        assert!(LeadStatus::Perdido.is_terminal());
        assert!(!LeadStatus::Transferido.is_terminal());
    }

    #[test]
    fn direction_parses_from_stored_form() {
        assert_eq!(Direction::from_str("inbound").unwrap(), Direction::Inbound);
        assert_eq!(Direction::from_str("outbound").unwrap(), Direction::Outbound);
    }

    #[test]
    fn bot_session_answers_serialize_as_object() {
        let mut answers = serde_json::Map::new();
        answers.insert("nome".into(), serde_json::Value::String("João".into()));
        let session = BotSession {
            conversation_id: "c1".into(),
            current_step: "mes".into(),
            answers,
            existing_customer: false,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_string(&session.answers).unwrap();
        assert_eq!(json, r#"{"nome":"João"}"#);
    }
}
