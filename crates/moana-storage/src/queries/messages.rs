// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.
//!
//! Transcript order is insertion order (`rowid`), which stays stable even
//! when several messages share a millisecond timestamp.

use moana_core::types::Message;
use moana_core::MoanaError;
use rusqlite::{params, Row};

use crate::database::{map_tr_err, Database};

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        metadata: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Insert a message and mark its session as recently active.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), MoanaError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, session_id, role, content, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.id,
                    msg.session_id,
                    msg.role,
                    msg.content,
                    msg.metadata,
                    msg.created_at,
                ],
            )?;
            tx.execute(
                "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                params![msg.created_at, msg.session_id],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Get messages for a session in chronological order.
///
/// With `limit`, only the newest `limit` messages are returned (still oldest first).
pub async fn get_messages_for_session(
    db: &Database,
    session_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, MoanaError> {
    let session_id = session_id.to_string();
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.unwrap_or(-1);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, metadata, created_at FROM (
                     SELECT rowid AS seq, id, session_id, role, content, metadata, created_at
                     FROM messages WHERE session_id = ?1
                     ORDER BY rowid DESC LIMIT ?2
                 ) ORDER BY seq ASC",
            )?;
            let messages = stmt
                .query_map(params![session_id, limit], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::sessions::create_session;
    use moana_core::types::Session;

    async fn setup_db_with_session() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let session = Session {
            id: "sess-1".to_string(),
            user_id: "alice".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        create_session(&db, &session).await.unwrap();
        db
    }

    fn message(id: &str, role: &str, content: &str) -> Message {
        Message {
            id: id.to_string(),
            session_id: "sess-1".to_string(),
            role: role.to_string(),
            content: content.to_string(),
            metadata: None,
            // Same timestamp on purpose: order must come from insertion.
            created_at: "2026-01-01T00:00:01.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn messages_come_back_in_insertion_order() {
        let db = setup_db_with_session().await;
        for (i, role) in ["user", "assistant", "tool", "assistant"].iter().enumerate() {
            insert_message(&db, &message(&format!("m{i}"), role, &format!("c{i}")))
                .await
                .unwrap();
        }

        let all = get_messages_for_session(&db, "sess-1", None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn limit_keeps_newest_messages() {
        let db = setup_db_with_session().await;
        for i in 0..5 {
            insert_message(&db, &message(&format!("m{i}"), "user", "x"))
                .await
                .unwrap();
        }

        let tail = get_messages_for_session(&db, "sess-1", Some(2)).await.unwrap();
        let ids: Vec<&str> = tail.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn metadata_is_preserved() {
        let db = setup_db_with_session().await;
        let mut msg = message("m0", "assistant", "");
        msg.metadata = Some(r#"[{"type":"tool_use"}]"#.to_string());
        insert_message(&db, &msg).await.unwrap();

        let stored = get_messages_for_session(&db, "sess-1", None).await.unwrap();
        assert_eq!(stored[0].metadata, msg.metadata);
    }

    #[tokio::test]
    async fn message_for_unknown_session_is_rejected() {
        let db = setup_db_with_session().await;
        let mut msg = message("orphan", "user", "hi");
        msg.session_id = "nope".to_string();
        assert!(insert_message(&db, &msg).await.is_err());
    }
}
