// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead pipeline: the canonical lead entity operations and their audit trail.
//!
//! Every mutation here reads the prior value, writes a history entry, and
//! applies the change inside one transaction on the single-writer
//! connection -- both commit or neither does, and racing mutations on the
//! same lead cannot interleave their read-before-write sequences.

pub mod pipeline;

pub use pipeline::{
    create_lead, delete_lead, move_backward, move_forward, move_to, rename, transfer,
    update_notes, update_qualification, NewLead,
};
