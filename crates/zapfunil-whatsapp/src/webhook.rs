// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook envelope: payload types, signature verification, and
//! mapping into the channel-agnostic [`InboundEvent`].
//!
//! The gateway delivers events at-least-once; idempotency is handled
//! downstream by the message upsert, not here.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use zapfunil_core::types::{DeliveryStatus, Direction, InboundEvent, MessageKind};

use zapfunil_linker::canonical_phone;

type HmacSha256 = Hmac<Sha256>;

/// Top-level webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    /// Event name, e.g. `messages.upsert` or `messages.update`.
    pub event: String,
    /// Instance the event belongs to.
    pub instance: String,
    pub data: EventData,
}

/// Event payload; fields present depend on the event name.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub key: Option<EventKey>,
    #[serde(default, rename = "pushName")]
    pub push_name: Option<String>,
    #[serde(default)]
    pub message: Option<MessageBody>,
    #[serde(default, rename = "messageTimestamp")]
    pub message_timestamp: Option<i64>,
    /// Delivery status on `messages.update` events.
    #[serde(default)]
    pub status: Option<String>,
}

/// Message identity within the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct EventKey {
    #[serde(rename = "remoteJid")]
    pub remote_jid: String,
    #[serde(default, rename = "fromMe")]
    pub from_me: bool,
    pub id: String,
}

/// Message content by kind; exactly one variant is normally present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default, rename = "imageMessage")]
    pub image_message: Option<MediaBody>,
    #[serde(default, rename = "audioMessage")]
    pub audio_message: Option<MediaBody>,
    #[serde(default, rename = "videoMessage")]
    pub video_message: Option<MediaBody>,
    #[serde(default, rename = "documentMessage")]
    pub document_message: Option<MediaBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default, rename = "fileName")]
    pub file_name: Option<String>,
}

/// Verify the webhook HMAC-SHA256 signature (hex, optional `sha256=` prefix).
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Map a provider delivery-status string onto the monotonic ordering.
pub fn map_status(raw: &str) -> Option<DeliveryStatus> {
    match raw {
        "PENDING" => Some(DeliveryStatus::Pending),
        "SERVER_ACK" => Some(DeliveryStatus::Sent),
        "DELIVERY_ACK" => Some(DeliveryStatus::Delivered),
        "READ" => Some(DeliveryStatus::Read),
        _ => None,
    }
}

/// Convert an envelope into the inbound event contract.
///
/// Returns `None` for events the core does not consume (presence updates,
/// unsupported message kinds, status events without a key).
pub fn to_inbound_event(envelope: &WebhookEnvelope) -> Option<InboundEvent> {
    let key = envelope.data.key.as_ref()?;
    let contact_phone = canonical_phone(&key.remote_jid);

    let direction = if key.from_me {
        Direction::Outbound
    } else {
        Direction::Inbound
    };
    let timestamp = envelope
        .data
        .message_timestamp
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now)
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let status = envelope.data.status.as_deref().and_then(map_status);

    // Status-only update: no message body required.
    if envelope.event == "messages.update" {
        return Some(InboundEvent {
            instance_id: envelope.instance.clone(),
            remote_jid: key.remote_jid.clone(),
            contact_phone,
            display_name: envelope.data.push_name.clone(),
            direction,
            kind: MessageKind::Text,
            content: String::new(),
            media_url: None,
            external_id: Some(key.id.clone()),
            status,
            timestamp,
        });
    }

    let body = envelope.data.message.as_ref()?;
    let (kind, content, media_url) = if let Some(text) = &body.conversation {
        (MessageKind::Text, text.clone(), None)
    } else if let Some(image) = &body.image_message {
        (
            MessageKind::Image,
            image.caption.clone().unwrap_or_default(),
            image.url.clone(),
        )
    } else if let Some(audio) = &body.audio_message {
        (MessageKind::Audio, String::new(), audio.url.clone())
    } else if let Some(video) = &body.video_message {
        (
            MessageKind::Video,
            video.caption.clone().unwrap_or_default(),
            video.url.clone(),
        )
    } else if let Some(document) = &body.document_message {
        (
            MessageKind::Document,
            document.file_name.clone().unwrap_or_default(),
            document.url.clone(),
        )
    } else {
        return None;
    };

    Some(InboundEvent {
        instance_id: envelope.instance.clone(),
        remote_jid: key.remote_jid.clone(),
        contact_phone,
        display_name: envelope.data.push_name.clone(),
        direction,
        kind,
        content,
        media_url,
        external_id: Some(key.id.clone()),
        status,
        timestamp,
    })
}
