// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extraction oracle with scripted answers per memory kind.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use moana_core::MoanaError;
use moana_memory::{Candidate, ExtractionOracle, ExtractionRequest, MemoryKind};

/// Answers every request for a kind with the same scripted candidates.
///
/// Kinds without a script get an empty answer; kinds marked failing get an
/// extraction error. Every request is recorded.
#[derive(Default)]
pub struct StubOracle {
    scripts: Mutex<HashMap<MemoryKind, Vec<Candidate>>>,
    failing: Mutex<HashSet<MemoryKind>>,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl StubOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the answer for `kind`, replacing any previous one.
    pub fn script(&self, kind: MemoryKind, candidates: Vec<Candidate>) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, candidates);
    }

    pub fn fail(&self, kind: MemoryKind) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
    }

    /// Total number of oracle invocations.
    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Requests seen for `kind`, oldest first.
    pub fn requests(&self, kind: MemoryKind) -> Vec<ExtractionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExtractionOracle for StubOracle {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Vec<Candidate>, MoanaError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&request.kind)
        {
            return Err(MoanaError::extraction(request.kind, "stub oracle failure"));
        }
        Ok(self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.kind)
            .cloned()
            .unwrap_or_default())
    }
}
