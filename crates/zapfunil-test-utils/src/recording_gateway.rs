// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording gateway double for deterministic testing.
//!
//! `RecordingGateway` implements `MessageGateway`, capturing every send
//! for assertion and optionally failing the next N sends to exercise the
//! no-advance-on-failure paths.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use zapfunil_core::gateway::{DeliveryReceipt, MessageGateway};
use zapfunil_core::types::{DeliveryStatus, MessageKind};
use zapfunil_core::ZapfunilError;

/// One captured outbound send.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub instance_id: String,
    pub phone: String,
    pub kind: MessageKind,
    /// Text content, or the media URL for media kinds.
    pub body: String,
    pub caption: Option<String>,
}

/// A messaging gateway that records sends instead of delivering them.
#[derive(Clone, Default)]
pub struct RecordingGateway {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_remaining: Arc<Mutex<usize>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` sends fail with a gateway error.
    pub async fn fail_next(&self, n: usize) {
        *self.fail_remaining.lock().await = n;
    }

    /// All messages sent so far, in order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Count of messages sent so far.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Text bodies sent so far, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.kind == MessageKind::Text)
            .map(|m| m.body.clone())
            .collect()
    }

    /// Drop everything recorded.
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    async fn record(
        &self,
        instance_id: &str,
        phone: &str,
        kind: MessageKind,
        body: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        {
            let mut remaining = self.fail_remaining.lock().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ZapfunilError::Gateway {
                    message: "injected send failure".to_string(),
                    source: None,
                });
            }
        }
        self.sent.lock().await.push(SentMessage {
            instance_id: instance_id.to_string(),
            phone: phone.to_string(),
            kind,
            body: body.to_string(),
            caption: caption.map(str::to_string),
        });
        Ok(DeliveryReceipt {
            external_id: Some(format!("rec-{}", uuid::Uuid::new_v4())),
            status: DeliveryStatus::Sent,
        })
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    async fn send_text(
        &self,
        instance_id: &str,
        phone: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.record(instance_id, phone, MessageKind::Text, text, None).await
    }

    async fn send_image(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.record(instance_id, phone, MessageKind::Image, url, caption).await
    }

    async fn send_audio(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.record(instance_id, phone, MessageKind::Audio, url, None).await
    }

    async fn send_video(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.record(instance_id, phone, MessageKind::Video, url, caption).await
    }

    async fn send_document(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        _filename: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.record(instance_id, phone, MessageKind::Document, url, caption).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends_in_order() {
        let gateway = RecordingGateway::new();
        gateway.send_text("central", "5511999990000", "oi").await.unwrap();
        gateway
            .send_image("central", "5511999990000", "https://cdn/x.jpg", Some("foto"))
            .await
            .unwrap();

        let sent = gateway.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, MessageKind::Text);
        assert_eq!(sent[0].body, "oi");
        assert_eq!(sent[1].caption.as_deref(), Some("foto"));
    }

    #[tokio::test]
    async fn injected_failures_then_recovery() {
        let gateway = RecordingGateway::new();
        gateway.fail_next(1).await;

        let err = gateway.send_text("central", "551", "x").await;
        assert!(err.is_err());

        gateway.send_text("central", "551", "x").await.unwrap();
        assert_eq!(gateway.sent_count().await, 1);
    }
}
