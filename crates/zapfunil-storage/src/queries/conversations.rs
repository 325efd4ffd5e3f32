// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.
//!
//! Conversations are never hard-deleted here; only the linker's merge
//! removes rows, and it does so inside its own transaction.

use rusqlite::params;
use zapfunil_core::ZapfunilError;

use crate::database::{map_tr_err, Database};
use crate::models::{conversation_from_row, Conversation, CONVERSATION_COLUMNS};

/// Insert a new conversation.
pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), ZapfunilError> {
    let c = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, instance_id, remote_jid, phone, display_name,
                     unit, lead_id, unread_count, favorite, bot_enabled, last_message_content,
                     last_message_direction, last_message_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    c.id,
                    c.instance_id,
                    c.remote_jid,
                    c.phone,
                    c.display_name,
                    c.unit,
                    c.lead_id,
                    c.unread_count,
                    c.favorite,
                    c.bot_enabled,
                    c.last_message_content,
                    c.last_message_direction.map(|d| d.to_string()),
                    c.last_message_at,
                    c.created_at,
                    c.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by id.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, ZapfunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql =
                format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let result = stmt.query_row(params![id], conversation_from_row);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by its (instance, remote address) identity.
pub async fn get_by_remote_jid(
    db: &Database,
    instance_id: &str,
    remote_jid: &str,
) -> Result<Option<Conversation>, ZapfunilError> {
    let instance_id = instance_id.to_string();
    let remote_jid = remote_jid.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE instance_id = ?1 AND remote_jid = ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let result = stmt.query_row(params![instance_id, remote_jid], conversation_from_row);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List conversations, most recently active first.
pub async fn list_conversations(db: &Database) -> Result<Vec<Conversation>, ZapfunilError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 ORDER BY last_message_at IS NULL, last_message_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], conversation_from_row)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
        .map_err(map_tr_err)
}

/// List conversations linked to a lead.
pub async fn list_for_lead(
    db: &Database,
    lead_id: &str,
) -> Result<Vec<Conversation>, ZapfunilError> {
    let lead_id = lead_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE lead_id = ?1 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![lead_id], conversation_from_row)?;
            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row?);
            }
            Ok(conversations)
        })
        .await
        .map_err(map_tr_err)
}

/// Override the per-conversation bot flag. `None` restores instance policy.
pub async fn set_bot_enabled(
    db: &Database,
    id: &str,
    enabled: Option<bool>,
) -> Result<(), ZapfunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET bot_enabled = ?1, updated_at = ?2 WHERE id = ?3",
                params![enabled, crate::models::now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Toggle the favorite flag.
pub async fn set_favorite(db: &Database, id: &str, favorite: bool) -> Result<(), ZapfunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET favorite = ?1, updated_at = ?2 WHERE id = ?3",
                params![favorite, crate::models::now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Reset the unread counter.
pub async fn mark_read(db: &Database, id: &str) -> Result<(), ZapfunilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET unread_count = 0, updated_at = ?1 WHERE id = ?2",
                params![crate::models::now_utc(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::now_utc;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    pub(crate) fn make_conversation(id: &str, instance: &str, phone: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            instance_id: instance.to_string(),
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

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let (db, _dir) = setup_db().await;
        let conv = make_conversation("c1", "central", "5511999990000");

        create_conversation(&db, &conv).await.unwrap();
        let got = get_conversation(&db, "c1").await.unwrap().unwrap();
        assert_eq!(got.phone, "5511999990000");
        assert_eq!(got.unit, "Central");
        assert!(got.bot_enabled.is_none());
        assert!(got.lead_id.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn lookup_by_remote_jid() {
        let (db, _dir) = setup_db().await;
        let conv = make_conversation("c1", "central", "5511999990000");
        create_conversation(&db, &conv).await.unwrap();

        let got = get_by_remote_jid(&db, "central", "5511999990000@s.whatsapp.net")
            .await
            .unwrap();
        assert!(got.is_some());

        let missing = get_by_remote_jid(&db, "norte", "5511999990000@s.whatsapp.net")
            .await
            .unwrap();
        assert!(missing.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_remote_jid_is_rejected() {
        let (db, _dir) = setup_db().await;
        let conv = make_conversation("c1", "central", "5511999990000");
        create_conversation(&db, &conv).await.unwrap();

        let mut dup = make_conversation("c2", "central", "5511999990000");
        dup.remote_jid = conv.remote_jid.clone();
        assert!(create_conversation(&db, &dup).await.is_err());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn bot_flag_and_favorite_updates() {
        let (db, _dir) = setup_db().await;
        create_conversation(&db, &make_conversation("c1", "central", "5511999990000"))
            .await
            .unwrap();

        set_bot_enabled(&db, "c1", Some(false)).await.unwrap();
        set_favorite(&db, "c1", true).await.unwrap();

        let got = get_conversation(&db, "c1").await.unwrap().unwrap();
        assert_eq!(got.bot_enabled, Some(false));
        assert!(got.favorite);

        set_bot_enabled(&db, "c1", None).await.unwrap();
        let got = get_conversation(&db, "c1").await.unwrap().unwrap();
        assert!(got.bot_enabled.is_none());

        db.close().await.unwrap();
    }
}
