// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applies oracle candidates to the store under each kind's conflict policy.
//!
//! - Memories: a candidate naming an existing key updates it in place; a
//!   candidate whose content matches an existing record (ignoring case and
//!   spacing) lands on that record; anything else gets a fresh key.
//! - Triples: keyed by [`Triple::fingerprint`], so the same fact is stored
//!   once. A candidate naming an existing key replaces that triple.
//! - Profile: one record under [`PROFILE_KEY`], merged field by field and
//!   written in a single put.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use moana_core::error::MoanaError;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::oracle::{instructions_for, schema_for, Candidate, ExtractionOracle, ExtractionRequest};
use crate::store::MemoryStore;
use crate::types::{
    recent_query, ConversationSnapshot, MemoryKind, MemoryRecord, Namespace, Profile, Triple,
    PROFILE_KEY,
};

/// Default number of existing records shown to the oracle.
const DEFAULT_CONTEXT_LIMIT: usize = 10;

/// Turns that seed the existing-record lookup.
const CONTEXT_TURNS: usize = 3;

/// Outcome of one extraction run for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Candidates that did not fit the kind's schema.
    pub rejected: usize,
}

impl ExtractionReport {
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

/// Runs the oracle for one kind and writes the results.
pub struct MemoryExtractor {
    store: Arc<dyn MemoryStore>,
    oracle: Arc<dyn ExtractionOracle>,
    context_limit: usize,
}

impl MemoryExtractor {
    pub fn new(store: Arc<dyn MemoryStore>, oracle: Arc<dyn ExtractionOracle>) -> Self {
        Self {
            store,
            oracle,
            context_limit: DEFAULT_CONTEXT_LIMIT,
        }
    }

    /// Caps how many existing records the oracle sees per run.
    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Extracts `kind` records from `snapshot` into the user's namespace.
    ///
    /// Oracle and store failures are returned; nothing is written when the
    /// oracle fails.
    pub async fn extract(
        &self,
        kind: MemoryKind,
        snapshot: &ConversationSnapshot,
    ) -> Result<ExtractionReport, MoanaError> {
        let namespace = Namespace::new(snapshot.user_id.clone(), kind);
        let existing = self.existing_context(&namespace, snapshot).await?;

        let request = ExtractionRequest {
            kind,
            instructions: instructions_for(kind).to_string(),
            schema: schema_for(kind),
            snapshot: snapshot.clone(),
            existing,
        };
        counter!("moana_memory_oracle_calls_total", "kind" => kind.as_str()).increment(1);
        let candidates = self.oracle.extract(&request).await?;
        debug!(namespace = %namespace, candidates = candidates.len(), "oracle candidates received");

        let report = match kind {
            MemoryKind::Memories => self.apply_memories(&namespace, candidates).await?,
            MemoryKind::Triples => self.apply_triples(&namespace, candidates).await?,
            MemoryKind::Profile => self.apply_profile(&namespace, candidates).await?,
        };

        counter!("moana_memory_records_written_total", "kind" => kind.as_str())
            .increment(report.written() as u64);
        Ok(report)
    }

    async fn existing_context(
        &self,
        namespace: &Namespace,
        snapshot: &ConversationSnapshot,
    ) -> Result<Vec<(String, Value)>, MoanaError> {
        let query = recent_query(&snapshot.turns, CONTEXT_TURNS);
        let query = (!query.is_empty()).then_some(query.as_str());
        let hits = self
            .store
            .search(namespace, query, self.context_limit)
            .await?;
        Ok(hits.into_iter().map(|hit| (hit.key, hit.value)).collect())
    }

    async fn apply_memories(
        &self,
        namespace: &Namespace,
        candidates: Vec<Candidate>,
    ) -> Result<ExtractionReport, MoanaError> {
        let mut report = ExtractionReport::default();
        let mut current: HashMap<String, Value> = self
            .store
            .get_all(namespace)
            .await?
            .into_iter()
            .map(|item| (item.key, item.value))
            .collect();

        for candidate in candidates {
            let record: MemoryRecord = match serde_json::from_value(candidate.value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "rejecting memory candidate");
                    report.rejected += 1;
                    continue;
                }
            };
            if record.content.trim().is_empty() {
                report.rejected += 1;
                continue;
            }

            let dedup = record.dedup_key();
            let target = candidate
                .key
                .filter(|key| current.contains_key(key))
                .or_else(|| {
                    current.iter().find_map(|(key, value)| {
                        serde_json::from_value::<MemoryRecord>(value.clone())
                            .ok()
                            .filter(|existing| existing.dedup_key() == dedup)
                            .map(|_| key.clone())
                    })
                });

            let value = serde_json::to_value(&record)
                .map_err(|e| MoanaError::extraction(namespace.kind, e.to_string()))?;
            let key = match target {
                Some(key) if current.get(&key) == Some(&value) => {
                    report.unchanged += 1;
                    continue;
                }
                Some(key) => {
                    report.updated += 1;
                    key
                }
                None => {
                    report.created += 1;
                    Uuid::new_v4().to_string()
                }
            };

            self.store.put(namespace, &key, value.clone()).await?;
            current.insert(key, value);
        }
        Ok(report)
    }

    async fn apply_triples(
        &self,
        namespace: &Namespace,
        candidates: Vec<Candidate>,
    ) -> Result<ExtractionReport, MoanaError> {
        let mut report = ExtractionReport::default();

        for candidate in candidates {
            let triple: Triple = match serde_json::from_value(candidate.value) {
                Ok(triple) if Triple::is_complete(&triple) => triple,
                Ok(_) => {
                    report.rejected += 1;
                    continue;
                }
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "rejecting triple candidate");
                    report.rejected += 1;
                    continue;
                }
            };

            let key = triple.fingerprint();
            let value = serde_json::to_value(&triple)
                .map_err(|e| MoanaError::extraction(namespace.kind, e.to_string()))?;

            let replaced = match candidate.key.filter(|k| *k != key) {
                Some(old) => self.store.get(namespace, &old).await?.map(|_| old),
                None => None,
            };

            let exists = self.store.get(namespace, &key).await?.is_some();
            if exists && replaced.is_none() {
                report.unchanged += 1;
                continue;
            }
            if !exists {
                self.store.put(namespace, &key, value).await?;
            }
            if replaced.is_some() {
                report.updated += 1;
            } else {
                report.created += 1;
            }

            if let Some(old) = replaced {
                self.store.delete(namespace, &old).await?;
                debug!(namespace = %namespace, old = %old, new = %key, "triple superseded");
            }
        }
        Ok(report)
    }

    async fn apply_profile(
        &self,
        namespace: &Namespace,
        candidates: Vec<Candidate>,
    ) -> Result<ExtractionReport, MoanaError> {
        let mut report = ExtractionReport::default();
        let stored = self.store.get(namespace, PROFILE_KEY).await?;
        let existed = stored.is_some();
        let mut profile = match stored {
            Some(item) => serde_json::from_value::<Profile>(item.value).unwrap_or_else(|e| {
                warn!(namespace = %namespace, error = %e, "stored profile unreadable, starting over");
                Profile::default()
            }),
            None => Profile::default(),
        };

        let mut changed = false;
        for candidate in candidates {
            match serde_json::from_value::<Profile>(candidate.value) {
                Ok(update) => changed |= profile.merge(&update),
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "rejecting profile candidate");
                    report.rejected += 1;
                }
            }
        }

        if !changed || profile.is_empty() {
            report.unchanged += usize::from(existed);
            return Ok(report);
        }

        let value = serde_json::to_value(&profile)
            .map_err(|e| MoanaError::extraction(namespace.kind, e.to_string()))?;
        self.store.put(namespace, PROFILE_KEY, value).await?;
        if existed {
            report.updated = 1;
        } else {
            report.created = 1;
        }
        Ok(report)
    }
}
