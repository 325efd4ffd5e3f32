// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Zapfunil sales pipeline.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed query
//! modules per table, and a row-level change feed backing the realtime
//! bridge contract.

pub mod database;
pub mod feed;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use feed::{ChangeEvent, ChangeOp};
pub use models::*;
