// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools.

pub mod memory;

pub use memory::{ManageMemoryTool, SearchMemoryTool};
