// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation linker: resolves conversations to leads by phone match or
//! explicit assignment, detects duplicate conversations, and merges them.
//!
//! Linking prefers no link over an overconfident wrong one: an ambiguous
//! phone match links nothing. Merge treats each secondary conversation as
//! an all-or-nothing unit so messages are never orphaned.

pub mod linker;
pub mod merge;
pub mod phone;

pub use linker::{link_by_phone, link_manually, link_system, unlink};
pub use merge::{detect_duplicates, merge, DuplicateGroup};
pub use phone::{canonical_phone, phone_variants};
