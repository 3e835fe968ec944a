// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The SQLite memory store against a migrated database.

use std::sync::Arc;

use moana_memory::{LocalEmbedder, MemoryKind, MemoryStore, Namespace, SqliteMemoryStore};
use moana_storage::Database;
use serde_json::json;

fn store(db: &Database) -> SqliteMemoryStore {
    SqliteMemoryStore::new(db.connection().clone(), Arc::new(LocalEmbedder::new(128)))
}

#[tokio::test]
async fn upsert_keeps_a_single_row_per_key() {
    let db = Database::open_in_memory().await.unwrap();
    let store = store(&db);
    let ns = Namespace::new("alice", MemoryKind::Memories);

    store.put(&ns, "k", json!({"content": "likes tea"})).await.unwrap();
    let first = store.get(&ns, "k").await.unwrap().unwrap();
    store.put(&ns, "k", json!({"content": "likes coffee"})).await.unwrap();
    let second = store.get(&ns, "k").await.unwrap().unwrap();

    assert_eq!(store.get_all(&ns).await.unwrap().len(), 1);
    assert_eq!(second.value, json!({"content": "likes coffee"}));
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at >= first.updated_at);
}

#[tokio::test]
async fn namespaces_do_not_leak() {
    let db = Database::open_in_memory().await.unwrap();
    let store = store(&db);
    let alice = Namespace::new("alice", MemoryKind::Triples);
    store
        .put(&alice, "t", json!({"subject": "a", "predicate": "b", "object": "c"}))
        .await
        .unwrap();

    for other in [
        Namespace::new("bob", MemoryKind::Triples),
        Namespace::new("alice", MemoryKind::Memories),
    ] {
        assert!(store.get(&other, "t").await.unwrap().is_none());
        assert!(store.search(&other, Some("a b c"), 10).await.unwrap().is_empty());
        assert!(!store.delete(&other, "t").await.unwrap());
    }
    assert!(store.get(&alice, "t").await.unwrap().is_some());
}

#[tokio::test]
async fn search_orders_by_similarity() {
    let db = Database::open_in_memory().await.unwrap();
    let store = store(&db);
    let ns = Namespace::new("alice", MemoryKind::Memories);
    store.put(&ns, "tea", json!({"content": "drinks green tea daily"})).await.unwrap();
    store.put(&ns, "car", json!({"content": "drives an old van"})).await.unwrap();

    let hits = store.search(&ns, Some("green tea"), 5).await.unwrap();
    assert_eq!(hits[0].key, "tea");
    assert!(hits.iter().all(|h| h.score.is_some()));

    let listed = store.search(&ns, None, 1).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].score, None);
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memory.db");
    let path = path.to_str().unwrap();
    let ns = Namespace::new("alice", MemoryKind::Profile);

    {
        let db = Database::open(path).await.unwrap();
        store(&db).put(&ns, "profile", json!({"name": "Alice"})).await.unwrap();
    }

    let db = Database::open(path).await.unwrap();
    let item = store(&db).get(&ns, "profile").await.unwrap().unwrap();
    assert_eq!(item.value["name"], "Alice");
}
