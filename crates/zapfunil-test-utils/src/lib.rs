// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles and fixtures for the Zapfunil workspace.

pub mod fixtures;
pub mod recording_gateway;

pub use fixtures::{conversation_fixture, step_fixture};
pub use recording_gateway::{RecordingGateway, SentMessage};
