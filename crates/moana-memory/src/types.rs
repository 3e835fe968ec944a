// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types: kinds, namespaces, record schemas and snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString, IntoStaticStr};

/// The three partitions of a user's long-term memory.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Free-text facts and preferences ([`MemoryRecord`]).
    Memories,
    /// Subject/predicate/object facts ([`Triple`]).
    Triples,
    /// The singleton [`Profile`].
    Profile,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 3] = [MemoryKind::Memories, MemoryKind::Triples, MemoryKind::Profile];

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Partition key `(user_id, kind)` for every store read and write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub user_id: String,
    pub kind: MemoryKind,
}

impl Namespace {
    pub fn new(user_id: impl Into<String>, kind: MemoryKind) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.kind)
    }
}

/// How sure the extractor was about a free-text memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl From<String> for Confidence {
    /// Unrecognized labels fall back to `Medium`.
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "low" => Confidence::Low,
            _ => Confidence::Medium,
        }
    }
}

/// A free-text memory about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// The specific information, preference or event being remembered.
    pub content: String,
    /// When and how the memory applies.
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub confidence: Confidence,
}

impl MemoryRecord {
    /// Content folded for duplicate detection.
    pub fn dedup_key(&self) -> String {
        normalize(&self.content)
    }
}

/// A subject/predicate/object fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    /// True when every part carries text.
    pub fn is_complete(&self) -> bool {
        [&self.subject, &self.predicate, &self.object]
            .iter()
            .all(|part| !part.trim().is_empty())
    }

    /// Stable store key derived from the normalized triple.
    ///
    /// Two triples that differ only in case or spacing share a key, so
    /// writing the same fact twice never creates a second record.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.subject, &self.predicate, &self.object] {
            hasher.update(normalize(part).as_bytes());
            hasher.update([0x1f]);
        }
        let digest = hasher.finalize();
        format!("triple-{}", hex::encode(&digest[..8]))
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// What is known about the user. One per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, deserialize_with = "known_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "known_age")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "known_text")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "known_text")]
    pub location: Option<String>,
}

/// The only key used in a profile namespace.
pub const PROFILE_KEY: &str = "profile";

impl Profile {
    /// True when no field is known.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.gender.is_none() && self.location.is_none()
    }

    /// Folds `update` into `self`.
    ///
    /// Unknown fields are filled, known fields change only when the update
    /// carries a genuinely different value, and an absent field in the
    /// update never erases what is already known. Returns whether anything
    /// changed.
    pub fn merge(&mut self, update: &Profile) -> bool {
        let mut changed = merge_text(&mut self.name, &update.name);
        changed |= merge_text(&mut self.gender, &update.gender);
        changed |= merge_text(&mut self.location, &update.location);
        if update.age.is_some() && update.age != self.age {
            self.age = update.age;
            changed = true;
        }
        changed
    }

    /// `(label, value)` pairs for the known fields, in display order.
    pub fn known_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(name) = &self.name {
            fields.push(("name", name.clone()));
        }
        if let Some(age) = self.age {
            fields.push(("age", age.to_string()));
        }
        if let Some(gender) = &self.gender {
            fields.push(("gender", gender.clone()));
        }
        if let Some(location) = &self.location {
            fields.push(("location", location.clone()));
        }
        fields
    }
}

fn merge_text(current: &mut Option<String>, update: &Option<String>) -> bool {
    match (current.as_deref(), update.as_deref()) {
        (_, None) => false,
        (Some(old), Some(new)) if old.eq_ignore_ascii_case(new) => false,
        (_, Some(new)) => {
            *current = Some(new.to_string());
            true
        }
    }
}

/// Placeholders that mean "no information".
fn is_placeholder(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "" | "unknown" | "n/a" | "none" | "null" | "not specified"
    )
}

fn known_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !is_placeholder(v))
        .map(|v| v.trim().to_string()))
}

fn known_age<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A record as held by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A search result. `score` is cosine similarity, absent for queryless listings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub value: serde_json::Value,
    pub score: Option<f32>,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One `{role, content}` entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The unit handed to extraction: system prompt, history and latest reply.
///
/// Built per turn and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    pub user_id: String,
    pub turns: Vec<Turn>,
}

impl ConversationSnapshot {
    pub fn new(user_id: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            user_id: user_id.into(),
            turns,
        }
    }

    /// `role: content` lines, one per non-empty turn.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .filter(|t| !t.content.trim().is_empty())
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Joins the content of the last `n` non-system turns into a search query.
pub fn recent_query(turns: &[Turn], n: usize) -> String {
    let conversational: Vec<&Turn> = turns
        .iter()
        .filter(|t| t.role != Role::System && !t.content.trim().is_empty())
        .collect();
    let start = conversational.len().saturating_sub(n);
    conversational[start..]
        .iter()
        .map(|t| t.content.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lowercases and collapses whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flattens the string leaves of a JSON value into the text that gets embedded.
pub fn value_text(value: &serde_json::Value) -> String {
    fn collect(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) => out.push(s.clone()),
            serde_json::Value::Number(n) => out.push(n.to_string()),
            serde_json::Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            serde_json::Value::Object(map) => map.values().for_each(|v| collect(v, out)),
            serde_json::Value::Bool(_) | serde_json::Value::Null => {}
        }
    }
    let mut parts = Vec::new();
    collect(value, &mut parts);
    parts.join(" ")
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn kind_round_trips_through_strings() {
        use std::str::FromStr;
        for kind in MemoryKind::ALL {
            assert_eq!(MemoryKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert_eq!(MemoryKind::from_str("PROFILE").unwrap(), MemoryKind::Profile);
        assert_eq!(serde_json::to_string(&MemoryKind::Triples).unwrap(), "\"triples\"");
    }

    #[test]
    fn namespace_displays_user_then_kind() {
        assert_eq!(Namespace::new("alice", MemoryKind::Memories).to_string(), "alice/memories");
    }

    #[test]
    fn confidence_parses_leniently() {
        let record: MemoryRecord = serde_json::from_value(serde_json::json!({
            "content": "likes tea",
            "context": "breakfast",
            "confidence": "HIGH"
        }))
        .unwrap();
        assert_eq!(record.confidence, Confidence::High);

        let vague: MemoryRecord = serde_json::from_value(serde_json::json!({
            "content": "maybe likes jazz",
            "confidence": "somewhat"
        }))
        .unwrap();
        assert_eq!(vague.confidence, Confidence::Medium);
        assert_eq!(vague.context, "");
        assert_eq!(serde_json::to_value(Confidence::Low).unwrap(), "low");
    }

    #[test]
    fn triple_fingerprint_ignores_case_and_spacing() {
        let a = Triple {
            subject: "User".into(),
            predicate: "lives in".into(),
            object: "Lisbon".into(),
        };
        let b = Triple {
            subject: " user ".into(),
            predicate: "LIVES  in".into(),
            object: "lisbon".into(),
        };
        let c = Triple {
            object: "Porto".into(),
            ..a.clone()
        };
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert!(a.fingerprint().starts_with("triple-"));
    }

    #[test]
    fn profile_placeholders_deserialize_as_unknown() {
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "name": "unknown",
            "age": "31",
            "gender": null,
            "location": " Lisbon "
        }))
        .unwrap();
        assert_eq!(profile.name, None);
        assert_eq!(profile.age, Some(31));
        assert_eq!(profile.gender, None);
        assert_eq!(profile.location.as_deref(), Some("Lisbon"));
    }

    #[test]
    fn profile_merge_fills_unknown_and_keeps_known() {
        let mut profile = Profile {
            name: Some("Alice".into()),
            ..Default::default()
        };
        let changed = profile.merge(&Profile {
            age: Some(30),
            ..Default::default()
        });
        assert!(changed);
        assert_eq!(profile.name.as_deref(), Some("Alice"));
        assert_eq!(profile.age, Some(30));
    }

    #[test]
    fn profile_merge_supersedes_with_new_information_only() {
        let mut profile = Profile {
            location: Some("Lisbon".into()),
            ..Default::default()
        };
        assert!(!profile.merge(&Profile {
            location: Some("lisbon".into()),
            ..Default::default()
        }));
        assert!(profile.merge(&Profile {
            location: Some("Berlin".into()),
            ..Default::default()
        }));
        assert_eq!(profile.location.as_deref(), Some("Berlin"));
    }

    #[test]
    fn recent_query_uses_last_conversational_turns() {
        let turns = vec![
            Turn::new(Role::System, "be nice"),
            Turn::new(Role::User, "one"),
            Turn::new(Role::Assistant, "two"),
            Turn::new(Role::User, ""),
            Turn::new(Role::User, "three"),
            Turn::new(Role::Assistant, "four"),
        ];
        assert_eq!(recent_query(&turns, 3), "two\nthree\nfour");
        assert_eq!(recent_query(&turns, 10), "one\ntwo\nthree\nfour");
        assert_eq!(recent_query(&[], 3), "");
    }

    #[test]
    fn value_text_flattens_leaves() {
        let text = value_text(&serde_json::json!({
            "content": "likes tea",
            "tags": ["drink", 2],
            "flag": true
        }));
        for part in ["likes tea", "drink", "2"] {
            assert!(text.contains(part), "{text}");
        }
    }

    #[test]
    fn cosine_similarity_edge_cases() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    fn arb_field() -> impl Strategy<Value = Option<String>> {
        prop::option::of("[A-Za-z]{1,8}")
    }

    fn arb_profile() -> impl Strategy<Value = Profile> {
        (arb_field(), prop::option::of(0u32..120), arb_field(), arb_field()).prop_map(
            |(name, age, gender, location)| Profile {
                name,
                age,
                gender,
                location,
            },
        )
    }

    proptest! {
        #[test]
        fn merge_never_forgets_known_fields(base in arb_profile(), update in arb_profile()) {
            let mut merged = base.clone();
            merged.merge(&update);
            prop_assert!(base.name.is_none() || merged.name.is_some());
            prop_assert!(base.age.is_none() || merged.age.is_some());
            prop_assert!(base.gender.is_none() || merged.gender.is_some());
            prop_assert!(base.location.is_none() || merged.location.is_some());
        }

        #[test]
        fn merge_is_idempotent(base in arb_profile(), update in arb_profile()) {
            let mut once = base.clone();
            once.merge(&update);
            let mut twice = once.clone();
            prop_assert!(!twice.merge(&update));
            prop_assert_eq!(once, twice);
        }
    }
}
