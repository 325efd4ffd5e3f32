// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Zapfunil sales pipeline engine.
//!
//! This crate provides the foundational error type, domain entity types,
//! the outbound messaging gateway trait, and the message template
//! interpolation function used throughout the Zapfunil workspace.

pub mod error;
pub mod gateway;
pub mod template;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ZapfunilError;
pub use gateway::{DeliveryReceipt, MessageGateway};
pub use types::{
    BotSession, BotSettings, BotStep, Conversation, DeliveryStatus, Direction, Followup,
    InboundEvent, Lead, LeadHistoryEntry, LeadStatus, Message, MessageKind,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lead_status_round_trips_through_strings() {
        for status in LeadStatus::ALL {
            let s = status.to_string();
            let parsed = LeadStatus::from_str(&s).expect("should parse back");
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn delivery_status_ordering_is_monotonic() {
        assert!(DeliveryStatus::Pending.rank() < DeliveryStatus::Sent.rank());
        assert!(DeliveryStatus::Sent.rank() < DeliveryStatus::Delivered.rank());
        assert!(DeliveryStatus::Delivered.rank() < DeliveryStatus::Read.rank());
    }
}
