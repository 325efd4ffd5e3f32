// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-stage delayed follow-up scheduler.
//!
//! Arming happens when a lead chooses "analyze later" in the bot's
//! next-step menu. The scheduler itself is passive: an external periodic
//! trigger calls [`FollowupScheduler::run_due`] to evaluate both stages.
//! Stage timing is always measured from the original arming event, and the
//! `followup_stageN_sent` history entry -- written only after confirmed
//! dispatch -- is the per-(lead, stage) idempotency guard.

pub mod scheduler;

pub use scheduler::{FollowupScheduler, TickReport};
