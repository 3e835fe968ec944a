// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Moana integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic tests
//! without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock LLM provider with queued responses
//! - [`StubOracle`] - Extraction oracle with scripted candidates
//! - [`FailingStore`] - Memory store that fails selected kinds
//! - [`TestHarness`] - Agent wired to in-memory storage and the mocks above

pub mod failing_store;
pub mod harness;
pub mod mock_provider;
pub mod stub_oracle;

pub use failing_store::FailingStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{text_response, tool_use_response, MockProvider};
pub use stub_oracle::StubOracle;
