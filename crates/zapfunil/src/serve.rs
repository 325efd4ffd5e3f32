// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook server and scheduler tick loop.
//!
//! Every inbound gateway event is one short-lived unit of work: verify,
//! ingest, dispatch to the bot. The follow-up scheduler has no worker loop
//! of its own; the periodic tick here re-evaluates due stages.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use zapfunil_bot::BotEngine;
use zapfunil_config::ZapfunilConfig;
use zapfunil_core::ZapfunilError;
use zapfunil_followup::FollowupScheduler;
use zapfunil_storage::Database;
use zapfunil_whatsapp::ingest::IngestOutcome;
use zapfunil_whatsapp::{process_event, verify_signature, EvolutionClient, WebhookEnvelope};

/// Shared state for axum request handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    config: Arc<ZapfunilConfig>,
    engine: Arc<BotEngine>,
}

/// Wire everything and serve until shutdown.
pub async fn run(config: ZapfunilConfig) -> Result<(), ZapfunilError> {
    let config = Arc::new(config);
    let db = Database::open_with_options(
        &config.storage.database_path,
        config.storage.wal_mode,
    )
    .await?;

    let gateway = Arc::new(EvolutionClient::new(&config)?);
    let engine = Arc::new(BotEngine::new(
        db.clone(),
        gateway.clone(),
        config.clone(),
    ));
    let scheduler = FollowupScheduler::new(db.clone(), gateway);

    let tick_secs = config.scheduler.tick_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
        loop {
            interval.tick().await;
            match scheduler.run_due(chrono::Utc::now()).await {
                Ok(report) => {
                    if !report.stage1_sent.is_empty() || !report.stage2_sent.is_empty() {
                        info!(
                            stage1 = report.stage1_sent.len(),
                            stage2 = report.stage2_sent.len(),
                            failures = report.failures,
                            "follow-up tick dispatched"
                        );
                    }
                }
                Err(e) => error!(error = %e, "follow-up tick failed"),
            }
        }
    });

    let state = AppState {
        db,
        config: config.clone(),
        engine,
    };
    let app = Router::new()
        .route("/webhook", post(post_webhook))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ZapfunilError::Gateway {
            message: format!("failed to bind webhook server to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("webhook server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| ZapfunilError::Gateway {
            message: format!("webhook server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

/// Inbound gateway events. A non-2xx response makes the gateway redeliver,
/// which the idempotent upsert tolerates.
async fn post_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(secret) = &state.config.server.webhook_secret {
        let signature = headers
            .get("x-webhook-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!("webhook signature rejected");
            return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"error": "bad signature"})));
        }
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "unparseable webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "bad payload"})),
            );
        }
    };

    let Some(event) = zapfunil_whatsapp::webhook::to_inbound_event(&envelope) else {
        // Events the core does not consume are acknowledged and dropped.
        return (StatusCode::OK, Json(serde_json::json!({"status": "ignored"})));
    };

    match process_event(&state.db, &state.config, event).await {
        Ok(IngestOutcome::Message {
            conversation,
            bot_input: Some(text),
            ..
        }) => {
            if let Err(e) = state.engine.handle_inbound(&conversation, &text).await {
                // The session holds its position; the next inbound retries.
                warn!(conversation_id = %conversation.id, error = %e, "bot advance failed");
            }
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
        }
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))),
        Err(e) => {
            error!(error = %e, "event ingestion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "ingestion failed"})),
            )
        }
    }
}

async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    // A cheap read proves the store is reachable.
    match zapfunil_storage::queries::bot::get_settings(&state.db).await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"status": "healthy"}))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "unhealthy", "error": e.to_string()})),
        ),
    }
}
