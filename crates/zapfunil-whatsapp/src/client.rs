// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an Evolution-API-compatible WhatsApp gateway.
//!
//! Each configured instance carries its own base URL and API key. Requests
//! authenticate via the `apikey` header; transient errors (429, 500, 503)
//! are retried once after a short delay. Failures surface to the caller --
//! the state machines upstream decide what a failed send means.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use zapfunil_config::{InstanceConfig, ZapfunilConfig};
use zapfunil_core::gateway::{DeliveryReceipt, MessageGateway};
use zapfunil_core::types::DeliveryStatus;
use zapfunil_core::ZapfunilError;

use crate::webhook::map_status;

/// Response shape returned by the gateway's send endpoints.
#[derive(Debug, Deserialize)]
struct SendResponse {
    key: Option<SendResponseKey>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponseKey {
    id: Option<String>,
}

/// Outbound gateway client, one HTTP connection pool for all instances.
#[derive(Debug, Clone)]
pub struct EvolutionClient {
    client: reqwest::Client,
    instances: HashMap<String, InstanceConfig>,
    max_retries: u32,
}

impl EvolutionClient {
    /// Build the client from the configured instances.
    pub fn new(config: &ZapfunilConfig) -> Result<Self, ZapfunilError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ZapfunilError::Gateway {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let instances = config
            .instances
            .iter()
            .map(|i| (i.id.clone(), i.clone()))
            .collect();

        Ok(Self {
            client,
            instances,
            max_retries: 1,
        })
    }

    fn instance(&self, instance_id: &str) -> Result<&InstanceConfig, ZapfunilError> {
        self.instances
            .get(instance_id)
            .ok_or_else(|| ZapfunilError::NotFound {
                entity: "instance",
                id: instance_id.to_string(),
            })
    }

    /// POST a send request, retrying once on transient errors.
    async fn post_send(
        &self,
        instance_id: &str,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        let instance = self.instance(instance_id)?;
        let url = format!(
            "{}/{}/{}",
            instance.base_url.trim_end_matches('/'),
            endpoint,
            instance.id
        );

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, endpoint, "retrying send after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&url)
                .header("apikey", &instance.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| ZapfunilError::Gateway {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, endpoint, "send response received");

            if status.is_success() {
                let parsed: SendResponse =
                    response.json().await.map_err(|e| ZapfunilError::Gateway {
                        message: format!("unparseable gateway response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return Ok(DeliveryReceipt {
                    external_id: parsed.key.and_then(|k| k.id),
                    status: parsed
                        .status
                        .as_deref()
                        .and_then(map_status)
                        .unwrap_or(DeliveryStatus::Pending),
                });
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body_text = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body_text, "transient gateway error, will retry");
                continue;
            }

            let body_text = response.text().await.unwrap_or_default();
            return Err(ZapfunilError::Gateway {
                message: format!("gateway returned {status}: {body_text}"),
                source: None,
            });
        }

        Err(ZapfunilError::Gateway {
            message: "send retries exhausted".to_string(),
            source: None,
        })
    }
}

fn is_transient_error(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

#[async_trait]
impl MessageGateway for EvolutionClient {
    async fn send_text(
        &self,
        instance_id: &str,
        phone: &str,
        text: &str,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.post_send(
            instance_id,
            "message/sendText",
            serde_json::json!({ "number": phone, "text": text }),
        )
        .await
    }

    async fn send_image(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.post_send(
            instance_id,
            "message/sendMedia",
            serde_json::json!({
                "number": phone,
                "mediatype": "image",
                "media": url,
                "caption": caption,
            }),
        )
        .await
    }

    async fn send_audio(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.post_send(
            instance_id,
            "message/sendWhatsAppAudio",
            serde_json::json!({ "number": phone, "audio": url }),
        )
        .await
    }

    async fn send_video(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.post_send(
            instance_id,
            "message/sendMedia",
            serde_json::json!({
                "number": phone,
                "mediatype": "video",
                "media": url,
                "caption": caption,
            }),
        )
        .await
    }

    async fn send_document(
        &self,
        instance_id: &str,
        phone: &str,
        url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ZapfunilError> {
        self.post_send(
            instance_id,
            "message/sendMedia",
            serde_json::json!({
                "number": phone,
                "mediatype": "document",
                "media": url,
                "fileName": filename,
                "caption": caption,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server_uri: &str) -> ZapfunilConfig {
        let mut config = ZapfunilConfig::default();
        config.instances = vec![InstanceConfig {
            id: "central".to_string(),
            unit: "Central".to_string(),
            base_url: server_uri.to_string(),
            api_key: "test-key".to_string(),
            bot_default: true,
        }];
        config
    }

    #[tokio::test]
    async fn send_text_posts_to_instance_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/central"))
            .and(header("apikey", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "number": "5511999990000",
                "text": "Olá!",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": { "id": "MSG-123" },
                "status": "PENDING",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = EvolutionClient::new(&config_for(&server.uri())).unwrap();
        let receipt = client
            .send_text("central", "5511999990000", "Olá!")
            .await
            .unwrap();

        assert_eq!(receipt.external_id.as_deref(), Some("MSG-123"));
        assert_eq!(receipt.status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn media_sends_use_send_media_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendMedia/central"))
            .and(body_partial_json(serde_json::json!({
                "mediatype": "document",
                "fileName": "proposta.pdf",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": { "id": "MSG-999" },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = EvolutionClient::new(&config_for(&server.uri())).unwrap();
        let receipt = client
            .send_document(
                "central",
                "5511999990000",
                "https://cdn.example/proposta.pdf",
                "proposta.pdf",
                Some("segue a proposta"),
            )
            .await
            .unwrap();
        assert_eq!(receipt.external_id.as_deref(), Some("MSG-999"));
    }

    #[tokio::test]
    async fn transient_error_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/central"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/central"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": { "id": "MSG-2" },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = EvolutionClient::new(&config_for(&server.uri())).unwrap();
        let receipt = client
            .send_text("central", "5511999990000", "oi")
            .await
            .unwrap();
        assert_eq!(receipt.external_id.as_deref(), Some("MSG-2"));
    }

    #[tokio::test]
    async fn permanent_error_surfaces_to_caller() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid apikey"))
            .mount(&server)
            .await;

        let client = EvolutionClient::new(&config_for(&server.uri())).unwrap();
        let err = client
            .send_text("central", "5511999990000", "oi")
            .await
            .unwrap_err();
        assert!(matches!(err, ZapfunilError::Gateway { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let client = EvolutionClient::new(&ZapfunilConfig::default()).unwrap();
        let err = client
            .send_text("nope", "5511999990000", "oi")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ZapfunilError::NotFound {
                entity: "instance",
                ..
            }
        ));
    }
}
