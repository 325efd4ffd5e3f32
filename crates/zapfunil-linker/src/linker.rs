// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation-to-lead link operations.
//!
//! `link_by_phone` is the system path (no actor); manual link and unlink
//! are always user-attributed. Every link change is recorded on the lead's
//! history in the same transaction as the conversation update.

use rusqlite::params;
use tracing::{debug, info};
use zapfunil_core::ZapfunilError;
use zapfunil_storage::database::map_tr_err;
use zapfunil_storage::queries::history::{actions, record_history};
use zapfunil_storage::queries::{conversations, leads};
use zapfunil_storage::Database;

use crate::phone::phone_variants;

/// Try to link a conversation to a lead by phone, scoped to the
/// conversation's unit.
///
/// Exactly one match links and returns the lead id. Zero matches or an
/// ambiguous (non-unique) match link nothing -- no link beats a wrong
/// link. Already-linked conversations are left untouched.
pub async fn link_by_phone(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<String>, ZapfunilError> {
    let conversation = conversations::get_conversation(db, conversation_id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "conversation",
            id: conversation_id.to_string(),
        })?;

    if conversation.lead_id.is_some() {
        return Ok(conversation.lead_id);
    }

    let variants = phone_variants(&conversation.phone);
    let matches = leads::find_by_phone_variants(db, &conversation.unit, &variants).await?;

    match matches.len() {
        0 => Ok(None),
        1 => {
            let lead_id = matches[0].id.clone();
            apply_link(db, conversation_id, &lead_id, None).await?;
            info!(conversation_id, lead_id = %lead_id, "conversation linked by phone");
            Ok(Some(lead_id))
        }
        n => {
            debug!(
                conversation_id,
                candidates = n,
                "ambiguous phone match, not linking"
            );
            Ok(None)
        }
    }
}

/// Explicitly link a conversation to a lead. Always user-attributed.
pub async fn link_manually(
    db: &Database,
    conversation_id: &str,
    lead_id: &str,
    actor: &str,
) -> Result<(), ZapfunilError> {
    leads::get_lead(db, lead_id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "lead",
            id: lead_id.to_string(),
        })?;
    conversations::get_conversation(db, conversation_id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "conversation",
            id: conversation_id.to_string(),
        })?;

    apply_link(db, conversation_id, lead_id, Some(actor)).await?;
    info!(conversation_id, lead_id, actor, "conversation linked manually");
    Ok(())
}

/// Remove a conversation's lead link. Always user-attributed. A no-op for
/// unlinked conversations.
pub async fn unlink(
    db: &Database,
    conversation_id: &str,
    actor: &str,
) -> Result<(), ZapfunilError> {
    let conversation = conversations::get_conversation(db, conversation_id)
        .await?
        .ok_or_else(|| ZapfunilError::NotFound {
            entity: "conversation",
            id: conversation_id.to_string(),
        })?;

    let Some(lead_id) = conversation.lead_id else {
        return Ok(());
    };

    let conversation_id_owned = conversation_id.to_string();
    let actor = actor.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE conversations SET lead_id = NULL, updated_at = ?1 WHERE id = ?2",
                params![
                    zapfunil_storage::models::now_utc(),
                    conversation_id_owned
                ],
            )?;
            record_history(
                &tx,
                &lead_id,
                Some(&actor),
                actions::CONVERSATION_UNLINKED,
                Some(&conversation_id_owned),
                None,
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    info!(conversation_id, "conversation unlinked");
    Ok(())
}

/// Link on behalf of the system (bot qualification). Records the link on
/// the lead's history with no actor.
pub async fn link_system(
    db: &Database,
    conversation_id: &str,
    lead_id: &str,
) -> Result<(), ZapfunilError> {
    apply_link(db, conversation_id, lead_id, None).await
}

/// Set the link and record it on the lead, in one transaction.
async fn apply_link(
    db: &Database,
    conversation_id: &str,
    lead_id: &str,
    actor: Option<&str>,
) -> Result<(), ZapfunilError> {
    let conversation_id = conversation_id.to_string();
    let lead_id = lead_id.to_string();
    let actor = actor.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE conversations SET lead_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    lead_id,
                    zapfunil_storage::models::now_utc(),
                    conversation_id
                ],
            )?;
            record_history(
                &tx,
                &lead_id,
                actor.as_deref(),
                actions::CONVERSATION_LINKED,
                None,
                Some(&conversation_id),
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zapfunil_core::{Conversation, DeliveryStatus, Direction, Message, MessageKind};
    use zapfunil_pipeline::{create_lead, NewLead};
    use zapfunil_storage::models::now_utc;
    use zapfunil_storage::queries::history::get_history;
    use zapfunil_storage::queries::messages::{append_message, count_messages};

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn conversation(id: &str, phone: &str, unit: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            instance_id: "central".to_string(),
            remote_jid: format!("{phone}@s.whatsapp.net"),
            phone: phone.to_string(),
            display_name: None,
            unit: unit.to_string(),
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

    fn lead(phone: &str, unit: &str) -> NewLead {
        NewLead {
            name: "João".to_string(),
            phone: phone.to_string(),
            unit: unit.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn links_across_country_code_variants() {
        let (db, _dir) = setup_db().await;
        // Lead stored without the country code, conversation with it.
        let l = create_lead(&db, lead("11999990000", "Central"), None).await.unwrap();
        conversations::create_conversation(&db, &conversation("c1", "5511999990000", "Central"))
            .await
            .unwrap();

        let linked = link_by_phone(&db, "c1").await.unwrap();
        assert_eq!(linked.as_deref(), Some(l.id.as_str()));

        let conv = conversations::get_conversation(&db, "c1").await.unwrap().unwrap();
        assert_eq!(conv.lead_id.as_deref(), Some(l.id.as_str()));

        let history = get_history(&db, &l.id).await.unwrap();
        let link_entry = history
            .iter()
            .find(|e| e.action == actions::CONVERSATION_LINKED)
            .unwrap();
        assert!(link_entry.actor.is_none(), "phone link is a system action");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ambiguous_match_links_nothing() {
        let (db, _dir) = setup_db().await;
        create_lead(&db, lead("5511999990000", "Central"), None).await.unwrap();
        create_lead(&db, lead("11999990000", "Central"), None).await.unwrap();
        conversations::create_conversation(&db, &conversation("c1", "5511999990000", "Central"))
            .await
            .unwrap();

        let linked = link_by_phone(&db, "c1").await.unwrap();
        assert!(linked.is_none());
        let conv = conversations::get_conversation(&db, "c1").await.unwrap().unwrap();
        assert!(conv.lead_id.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn match_is_unit_scoped() {
        let (db, _dir) = setup_db().await;
        create_lead(&db, lead("5511999990000", "Norte"), None).await.unwrap();
        conversations::create_conversation(&db, &conversation("c1", "5511999990000", "Central"))
            .await
            .unwrap();

        assert!(link_by_phone(&db, "c1").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn link_unlink_round_trip_preserves_messages() {
        let (db, _dir) = setup_db().await;
        let l = create_lead(&db, lead("5511999990000", "Central"), None).await.unwrap();
        conversations::create_conversation(&db, &conversation("c1", "5511999990000", "Central"))
            .await
            .unwrap();
        append_message(
            &db,
            &Message {
                id: "m1".to_string(),
                conversation_id: "c1".to_string(),
                external_id: None,
                direction: Direction::Inbound,
                kind: MessageKind::Text,
                content: "oi".to_string(),
                media_url: None,
                status: DeliveryStatus::Delivered,
                created_at: now_utc(),
            },
        )
        .await
        .unwrap();

        link_manually(&db, "c1", &l.id, "maria").await.unwrap();
        unlink(&db, "c1", "maria").await.unwrap();

        let conv = conversations::get_conversation(&db, "c1").await.unwrap().unwrap();
        assert!(conv.lead_id.is_none(), "round trip restores the null link");
        assert_eq!(count_messages(&db, "c1").await.unwrap(), 1);

        let history = get_history(&db, &l.id).await.unwrap();
        let linked = history
            .iter()
            .find(|e| e.action == actions::CONVERSATION_LINKED)
            .unwrap();
        assert_eq!(linked.actor.as_deref(), Some("maria"));
        let unlinked = history
            .iter()
            .find(|e| e.action == actions::CONVERSATION_UNLINKED)
            .unwrap();
        assert_eq!(unlinked.actor.as_deref(), Some("maria"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unlink_without_link_is_noop() {
        let (db, _dir) = setup_db().await;
        conversations::create_conversation(&db, &conversation("c1", "5511999990000", "Central"))
            .await
            .unwrap();
        unlink(&db, "c1", "maria").await.unwrap();
        db.close().await.unwrap();
    }
}
