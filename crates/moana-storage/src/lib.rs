// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Moana agent.
//!
//! Holds the short-term checkpointer (sessions and their transcripts) and
//! owns the schema, including the `memory_items` table used by the durable
//! long-term memory store. All access goes through `tokio-rusqlite`'s single
//! background thread.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
