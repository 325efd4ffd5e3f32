// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging gateway trait.
//!
//! The transport behind this trait is an external collaborator. Failures
//! must surface to the caller -- state machines decide for themselves
//! whether to advance, and they never advance on a failed send.

use async_trait::async_trait;

use crate::error::ZapfunilError;
use crate::types::DeliveryStatus;

/// Result of one accepted outbound send.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Provider message id, when the gateway reports one.
    pub external_id: Option<String>,
    pub status: DeliveryStatus,
}

/// Adapter for sending messages to a contact through one messaging instance.
///
/// `instance_id` selects the credential set; `phone` is the canonical
/// digits-only destination.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(
        &self,
        instance_id: &str,
        phone: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, ZapfunilError>;

    async fn send_image(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError>;

    async fn send_audio(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
    ) -> Result<DeliveryReceipt, ZapfunilError>;

    async fn send_video(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError>;

    async fn send_document(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError>;
}
