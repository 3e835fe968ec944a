// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for checkpointer tables.

pub mod messages;
pub mod sessions;
