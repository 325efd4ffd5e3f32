// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot qualification engine: drives a contact through the scripted,
//! administrator-ordered question sequence, branches on existing customers,
//! collapses completed sessions into leads, and sequences material sends.
//!
//! The session row is persisted only after a transition's outbound sends
//! succeed, so a delivery failure never advances the step pointer and a
//! session never skips a step.

pub mod engine;
pub mod materials;

pub use engine::{BotEngine, BotOutcome, MenuChoice};
