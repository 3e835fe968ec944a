// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation loop for the Moana agent.
//!
//! [`Agent`] checkpoints every message through a [`moana_core::StorageAdapter`],
//! injects recalled long-term memory into the system prompt before each model
//! call, and hands each reply to the extraction scheduler.

pub mod context;
pub mod session;
pub mod tool;
pub mod tools;

pub use context::{load_system_prompt, render_system_prompt};
pub use session::{Agent, MemoryHooks, TurnOutcome, STEP_LIMIT_REPLY};
pub use tool::{Tool, ToolOutput, ToolRegistry};
