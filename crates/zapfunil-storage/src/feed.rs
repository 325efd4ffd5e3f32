// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-level change feed backing the realtime bridge contract.
//!
//! Every committed row change on the single-writer connection is published
//! as a [`ChangeEvent`] on a broadcast channel. Consumers (UI bridges,
//! tests) subscribe via [`crate::Database::subscribe`] and reconcile their
//! caches from the store -- never the reverse.

use serde::{Deserialize, Serialize};

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One committed row change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
    pub rowid: i64,
}
