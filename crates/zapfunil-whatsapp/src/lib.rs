// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp gateway integration.
//!
//! [`client::EvolutionClient`] implements the outbound [`MessageGateway`]
//! contract against an Evolution-API-compatible HTTP gateway. The
//! [`webhook`] module types and verifies the inbound event envelope, and
//! [`ingest`] turns verified events into conversation/message upserts.
//!
//! [`MessageGateway`]: zapfunil_core::MessageGateway

pub mod client;
pub mod ingest;
pub mod webhook;

pub use client::EvolutionClient;
pub use ingest::{process_event, IngestOutcome};
pub use webhook::{verify_signature, WebhookEnvelope};
