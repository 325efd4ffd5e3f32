// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event ingestion.
//!
//! Turns one verified gateway event into store mutations: conversation
//! upsert keyed by (instance, remote address), idempotent message append
//! by external id, snapshot/unread maintenance, and monotonic status
//! transitions. New conversations get an automatic phone-match link
//! attempt. Bot dispatch is the caller's job -- ingestion only reports
//! which inbound texts qualify.

use tracing::{debug, info};
use uuid::Uuid;
use zapfunil_config::ZapfunilConfig;
use zapfunil_core::types::{Conversation, DeliveryStatus, Direction, InboundEvent, Message};
use zapfunil_core::ZapfunilError;
use zapfunil_storage::models::now_utc;
use zapfunil_storage::queries::{conversations, messages};
use zapfunil_storage::Database;

/// What ingestion did with one event.
#[derive(Debug)]
pub enum IngestOutcome {
    /// A delivery-status update was applied (or ignored as a regression).
    StatusUpdate { applied: bool },
    /// A message was stored (or skipped as a gateway retry). For inbound
    /// text, the conversation and content are handed back for bot dispatch.
    Message {
        conversation: Conversation,
        inserted: bool,
        bot_input: Option<String>,
    },
}

/// Process one inbound event against the store.
pub async fn process_event(
    db: &Database,
    config: &ZapfunilConfig,
    event: InboundEvent,
) -> Result<IngestOutcome, ZapfunilError> {
    // Status-only updates carry no content.
    if event.content.is_empty() && event.status.is_some() {
        let applied = match &event.external_id {
            Some(external_id) => {
                messages::update_status(db, external_id, event.status.unwrap_or(DeliveryStatus::Pending))
                    .await?
            }
            None => false,
        };
        return Ok(IngestOutcome::StatusUpdate { applied });
    }

    let conversation = find_or_create_conversation(db, config, &event).await?;

    let message = Message {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation.id.clone(),
        external_id: event.external_id.clone(),
        direction: event.direction,
        kind: event.kind,
        content: event.content.clone(),
        media_url: event.media_url.clone(),
        status: event.status.unwrap_or(match event.direction {
            Direction::Inbound => DeliveryStatus::Delivered,
            Direction::Outbound => DeliveryStatus::Sent,
        }),
        created_at: event.timestamp.clone(),
    };
    let inserted = messages::append_message(db, &message).await?;
    if !inserted {
        debug!(external_id = ?event.external_id, "gateway retry, message already stored");
    }

    // Reload so callers see the refreshed snapshot and any auto-link.
    let conversation = conversations::get_conversation(db, &conversation.id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "conversation",
            id: conversation.id.clone(),
        })?;

    let bot_input = (inserted
        && event.direction == Direction::Inbound
        && event.kind == zapfunil_core::types::MessageKind::Text)
        .then(|| event.content.clone());

    Ok(IngestOutcome::Message {
        conversation,
        inserted,
        bot_input,
    })
}

/// Upsert the conversation for an event's (instance, remote address).
///
/// Creation denormalizes the unit from the instance config and immediately
/// tries a phone-match link, so a returning contact lands on their lead.
async fn find_or_create_conversation(
    db: &Database,
    config: &ZapfunilConfig,
    event: &InboundEvent,
) -> Result<Conversation, ZapfunilError> {
    if let Some(existing) =
        conversations::get_by_remote_jid(db, &event.instance_id, &event.remote_jid).await?
    {
        return Ok(existing);
    }

    let instance = config
        .instance(&event.instance_id)
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "instance",
            id: event.instance_id.clone(),
        })?;

    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        instance_id: event.instance_id.clone(),
        remote_jid: event.remote_jid.clone(),
        phone: event.contact_phone.clone(),
        display_name: event.display_name.clone(),
        unit: instance.unit.clone(),
        lead_id: None,
        unread_count: 0,
        favorite: false,
        bot_enabled: None,
        last_message_content: None,
        last_message_direction: None,
        last_message_at: None,
        created_at: now_utc(),
        updated_at: now_utc(),
    };
    conversations::create_conversation(db, &conversation).await?;
    info!(
        conversation_id = %conversation.id,
        instance = %event.instance_id,
        "conversation created"
    );

    zapfunil_linker::link_by_phone(db, &conversation.id).await?;

    conversations::get_conversation(db, &conversation.id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "conversation",
            id: conversation.id.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zapfunil_config::InstanceConfig;
    use zapfunil_core::types::MessageKind;
    use zapfunil_pipeline::{create_lead, NewLead};
    use zapfunil_storage::queries::messages::count_messages;

    fn config() -> ZapfunilConfig {
        let mut config = ZapfunilConfig::default();
        config.instances = vec![InstanceConfig {
            id: "central".to_string(),
            unit: "Central".to_string(),
            base_url: "http://gateway.invalid".to_string(),
            api_key: "k".to_string(),
            bot_default: true,
        }];
        config
    }

    fn text_event(external_id: &str, text: &str, timestamp: &str) -> InboundEvent {
        InboundEvent {
            instance_id: "central".to_string(),
            remote_jid: "5511999990000@s.whatsapp.net".to_string(),
            contact_phone: "5511999990000".to_string(),
            display_name: Some("João".to_string()),
            direction: Direction::Inbound,
            kind: MessageKind::Text,
            content: text.to_string(),
            media_url: None,
            external_id: Some(external_id.to_string()),
            status: None,
            timestamp: timestamp.to_string(),
        }
    }

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn first_event_creates_conversation_with_instance_unit() {
        let (db, _dir) = setup_db().await;

        let outcome = process_event(
            &db,
            &config(),
            text_event("e1", "oi", "2026-01-01T00:00:01.000Z"),
        )
        .await
        .unwrap();

        let IngestOutcome::Message {
            conversation,
            inserted,
            bot_input,
        } = outcome
        else {
            panic!("expected message outcome");
        };
        assert!(inserted);
        assert_eq!(conversation.unit, "Central");
        assert_eq!(conversation.phone, "5511999990000");
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(bot_input.as_deref(), Some("oi"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn gateway_retry_is_idempotent() {
        let (db, _dir) = setup_db().await;
        let cfg = config();

        process_event(&db, &cfg, text_event("e1", "oi", "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        let outcome =
            process_event(&db, &cfg, text_event("e1", "oi", "2026-01-01T00:00:01.000Z"))
                .await
                .unwrap();

        let IngestOutcome::Message {
            conversation,
            inserted,
            bot_input,
        } = outcome
        else {
            panic!("expected message outcome");
        };
        assert!(!inserted);
        assert!(bot_input.is_none(), "retries never re-trigger the bot");
        assert_eq!(count_messages(&db, &conversation.id).await.unwrap(), 1);
        assert_eq!(conversation.unread_count, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn new_conversation_auto_links_to_matching_lead() {
        let (db, _dir) = setup_db().await;

        let lead = create_lead(
            &db,
            NewLead {
                name: "João".to_string(),
                phone: "11999990000".to_string(), // stored without country code
                unit: "Central".to_string(),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

        let outcome = process_event(
            &db,
            &config(),
            text_event("e1", "oi", "2026-01-01T00:00:01.000Z"),
        )
        .await
        .unwrap();

        let IngestOutcome::Message { conversation, .. } = outcome else {
            panic!("expected message outcome");
        };
        assert_eq!(conversation.lead_id.as_deref(), Some(lead.id.as_str()));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outbound_event_does_not_bump_unread_or_bot() {
        let (db, _dir) = setup_db().await;

        let mut event = text_event("e1", "resposta da loja", "2026-01-01T00:00:01.000Z");
        event.direction = Direction::Outbound;
        let outcome = process_event(&db, &config(), event).await.unwrap();

        let IngestOutcome::Message {
            conversation,
            bot_input,
            ..
        } = outcome
        else {
            panic!("expected message outcome");
        };
        assert_eq!(conversation.unread_count, 0);
        assert!(bot_input.is_none());
        assert_eq!(
            conversation.last_message_direction,
            Some(Direction::Outbound)
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_event_applies_monotonically() {
        let (db, _dir) = setup_db().await;
        let cfg = config();

        let mut event = text_event("e1", "oi", "2026-01-01T00:00:01.000Z");
        event.direction = Direction::Outbound;
        process_event(&db, &cfg, event).await.unwrap();

        let status_event = InboundEvent {
            content: String::new(),
            status: Some(DeliveryStatus::Read),
            ..text_event("e1", "", "2026-01-01T00:00:02.000Z")
        };
        let outcome = process_event(&db, &cfg, status_event).await.unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::StatusUpdate { applied: true }
        ));

        // A late delivered receipt after read is ignored.
        let late = InboundEvent {
            content: String::new(),
            status: Some(DeliveryStatus::Delivered),
            ..text_event("e1", "", "2026-01-01T00:00:03.000Z")
        };
        let outcome = process_event(&db, &cfg, late).await.unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::StatusUpdate { applied: false }
        ));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_instance_is_rejected() {
        let (db, _dir) = setup_db().await;
        let mut event = text_event("e1", "oi", "2026-01-01T00:00:01.000Z");
        event.instance_id = "desconhecida".to_string();

        let err = process_event(&db, &config(), event).await.unwrap_err();
        assert!(matches!(
            err,
            ZapfunilError::NotFound {
                entity: "instance",
                ..
            }
        ));

        db.close().await.unwrap();
    }
}
