// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table group.

pub mod bot;
pub mod conversations;
pub mod followups;
pub mod history;
pub mod leads;
pub mod messages;
