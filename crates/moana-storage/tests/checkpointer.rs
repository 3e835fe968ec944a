// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A transcript written in one process run is readable after reopening.

use moana_config::model::StorageConfig;
use moana_core::types::{Message, Session};
use moana_core::StorageAdapter;
use moana_storage::SqliteStorage;

fn config(path: &std::path::Path) -> StorageConfig {
    StorageConfig {
        database_path: path.to_string_lossy().into_owned(),
        wal_mode: true,
    }
}

#[tokio::test]
async fn transcript_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("moana.db");

    {
        let storage = SqliteStorage::new(config(&path));
        storage.initialize().await.unwrap();
        storage
            .create_session(&Session {
                id: "s1".into(),
                user_id: "alice".into(),
                created_at: "2026-01-01T00:00:00.000Z".into(),
                updated_at: "2026-01-01T00:00:00.000Z".into(),
            })
            .await
            .unwrap();
        for (i, (role, content)) in [("user", "hi"), ("assistant", "hello alice")]
            .into_iter()
            .enumerate()
        {
            storage
                .insert_message(&Message {
                    id: format!("m{i}"),
                    session_id: "s1".into(),
                    role: role.into(),
                    content: content.into(),
                    metadata: None,
                    created_at: format!("2026-01-01T00:00:0{i}.000Z"),
                })
                .await
                .unwrap();
        }
        storage.close().await.unwrap();
    }

    let storage = SqliteStorage::new(config(&path));
    storage.initialize().await.unwrap();

    let sessions = storage.list_sessions("alice").await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].updated_at, "2026-01-01T00:00:01.000Z");

    let messages = storage.get_messages("s1", None).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "hello alice"]);
}
