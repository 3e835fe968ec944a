// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conflict policy per memory kind, driven through a scripted oracle.

mod common;

use std::sync::Arc;

use common::{memory_store, snapshot, ScriptedOracle};
use moana_core::error::MoanaError;
use moana_memory::{
    Candidate, MemoryExtractor, MemoryKind, MemoryRecord, MemoryStore, Namespace, Profile,
    PROFILE_KEY,
};
use serde_json::json;

#[tokio::test]
async fn memory_update_replaces_in_place() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|request| {
        let transcript = request.snapshot.transcript();
        if transcript.contains("switched to coffee") {
            let tea_key = request
                .existing
                .iter()
                .find(|(_, v)| v["content"].as_str().is_some_and(|c| c.contains("tea")))
                .map(|(k, _)| k.clone())
                .expect("tea memory should be offered to the oracle");
            Ok(vec![Candidate::update(
                tea_key,
                json!({"content": "prefers coffee", "confidence": "high"}),
            )])
        } else {
            Ok(vec![Candidate::new(json!({"content": "prefers tea"}))])
        }
    });
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);
    let ns = Namespace::new("alice", MemoryKind::Memories);

    let first = extractor
        .extract(MemoryKind::Memories, &snapshot("alice", &[("I love tea", "Noted!")]))
        .await
        .unwrap();
    assert_eq!(first.created, 1);
    let original = store.get_all(&ns).await.unwrap().remove(0);

    let second = extractor
        .extract(
            MemoryKind::Memories,
            &snapshot(
                "alice",
                &[("I love tea", "Noted!"), ("I switched to coffee", "Got it")],
            ),
        )
        .await
        .unwrap();
    assert_eq!(second.updated, 1);
    assert_eq!(second.created, 0);

    let items = store.get_all(&ns).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].key, original.key);
    let record: MemoryRecord = serde_json::from_value(items[0].value.clone()).unwrap();
    assert_eq!(record.content, "prefers coffee");
    assert_eq!(items[0].created_at, original.created_at);
}

#[tokio::test]
async fn repeated_memory_content_is_not_duplicated() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|_| {
        Ok(vec![
            Candidate::new(json!({"content": "Owns a dog named Rex"})),
            Candidate::new(json!({"content": "owns a dog  named rex"})),
        ])
    });
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);
    let snap = snapshot("alice", &[("My dog Rex is great", "Nice")]);

    extractor.extract(MemoryKind::Memories, &snap).await.unwrap();
    let again = extractor.extract(MemoryKind::Memories, &snap).await.unwrap();

    assert_eq!(again.created, 0);
    let ns = Namespace::new("alice", MemoryKind::Memories);
    assert_eq!(store.get_all(&ns).await.unwrap().len(), 1);
}

#[tokio::test]
async fn candidates_outside_the_schema_are_rejected() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|_| {
        Ok(vec![
            Candidate::new(json!({"context": "no content"})),
            Candidate::new(json!({"content": "   "})),
            Candidate::new(json!({"content": "valid"})),
        ])
    });
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);
    let report = extractor
        .extract(MemoryKind::Memories, &snapshot("alice", &[("hi", "hello")]))
        .await
        .unwrap();
    assert_eq!(report.rejected, 2);
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn profile_merges_across_runs() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|request| {
        let transcript = request.snapshot.transcript();
        if transcript.contains("I am 30") {
            Ok(vec![Candidate::new(json!({"name": "unknown", "age": 30}))])
        } else {
            Ok(vec![Candidate::new(json!({"name": "Alice"}))])
        }
    });
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);

    extractor
        .extract(MemoryKind::Profile, &snapshot("alice", &[("I'm Alice", "Hi Alice")]))
        .await
        .unwrap();
    let report = extractor
        .extract(MemoryKind::Profile, &snapshot("alice", &[("I am 30", "Cool")]))
        .await
        .unwrap();
    assert_eq!(report.updated, 1);

    let ns = Namespace::new("alice", MemoryKind::Profile);
    let items = store.get_all(&ns).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].key, PROFILE_KEY);
    let profile: Profile = serde_json::from_value(items[0].value.clone()).unwrap();
    assert_eq!(profile.name.as_deref(), Some("Alice"));
    assert_eq!(profile.age, Some(30));
}

#[tokio::test]
async fn identical_triples_share_one_record() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|_| {
        Ok(vec![
            Candidate::new(json!({"subject": "user", "predicate": "lives in", "object": "Lisbon"})),
            Candidate::new(json!({"subject": "User", "predicate": "lives  in", "object": "lisbon"})),
        ])
    });
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);
    let snap = snapshot("alice", &[("I live in Lisbon", "Lovely city")]);

    let first = extractor.extract(MemoryKind::Triples, &snap).await.unwrap();
    let second = extractor.extract(MemoryKind::Triples, &snap).await.unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.written(), 0);
    let ns = Namespace::new("alice", MemoryKind::Triples);
    assert_eq!(store.get_all(&ns).await.unwrap().len(), 1);
}

#[tokio::test]
async fn contradicting_triple_replaces_the_old_one() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|request| {
        if request.snapshot.transcript().contains("moved to Porto") {
            let (key, _) = request.existing.first().cloned().expect("existing triple");
            Ok(vec![Candidate::update(
                key,
                json!({"subject": "user", "predicate": "lives in", "object": "Porto"}),
            )])
        } else {
            Ok(vec![Candidate::new(
                json!({"subject": "user", "predicate": "lives in", "object": "Lisbon"}),
            )])
        }
    });
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);

    extractor
        .extract(MemoryKind::Triples, &snapshot("alice", &[("I live in Lisbon", "ok")]))
        .await
        .unwrap();
    let report = extractor
        .extract(MemoryKind::Triples, &snapshot("alice", &[("I moved to Porto", "ok")]))
        .await
        .unwrap();
    assert_eq!(report.updated, 1);

    let ns = Namespace::new("alice", MemoryKind::Triples);
    let items = store.get_all(&ns).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].value["object"], "Porto");
}

#[tokio::test]
async fn oracle_failure_writes_nothing() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|request| {
        Err(MoanaError::extraction(request.kind, "model returned prose"))
    });
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);

    let err = extractor
        .extract(MemoryKind::Memories, &snapshot("alice", &[("hi", "hello")]))
        .await
        .unwrap_err();
    assert!(matches!(err, MoanaError::Extraction { .. }));
    let ns = Namespace::new("alice", MemoryKind::Memories);
    assert!(store.get_all(&ns).await.unwrap().is_empty());
}

#[tokio::test]
async fn extraction_stays_inside_the_users_namespace() {
    let store: Arc<dyn MemoryStore> = Arc::new(memory_store());
    let oracle = ScriptedOracle::new(|_| Ok(vec![Candidate::new(json!({"content": "likes jazz"}))]));
    let extractor = MemoryExtractor::new(Arc::clone(&store), oracle);

    extractor
        .extract(MemoryKind::Memories, &snapshot("alice", &[("jazz!", "nice")]))
        .await
        .unwrap();

    let bob = Namespace::new("bob", MemoryKind::Memories);
    assert!(store.get_all(&bob).await.unwrap().is_empty());
    assert!(store.search(&bob, Some("jazz"), 5).await.unwrap().is_empty());
}
