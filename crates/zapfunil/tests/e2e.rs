// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pass over the core: webhook event in, qualification dialog,
//! lead creation, menu resolution, and the two follow-up stages -- against
//! a temp database and a recording gateway.

use std::sync::Arc;

use chrono::{Duration, Utc};
use zapfunil_bot::{BotEngine, BotOutcome, MenuChoice};
use zapfunil_config::{InstanceConfig, ZapfunilConfig};
use zapfunil_core::LeadStatus;
use zapfunil_followup::FollowupScheduler;
use zapfunil_storage::queries::{bot, followups, history, leads};
use zapfunil_storage::Database;
use zapfunil_test_utils::{step_fixture, RecordingGateway};
use zapfunil_whatsapp::ingest::IngestOutcome;
use zapfunil_whatsapp::{process_event, webhook, WebhookEnvelope};

fn config() -> Arc<ZapfunilConfig> {
    let mut config = ZapfunilConfig::default();
    config.instances = vec![InstanceConfig {
        id: "central".to_string(),
        unit: "Central".to_string(),
        base_url: "http://gateway.invalid".to_string(),
        api_key: "k".to_string(),
        bot_default: true,
    }];
    Arc::new(config)
}

async fn seed(db: &Database) {
    let mut settings = bot::get_settings(db).await.unwrap();
    settings.enabled = true;
    settings.existing_customer_pattern = "(?i)sou cliente".to_string();
    settings.completion_message =
        Some("Perfeito, {{nome}}! Festa em {{mes}} para {{convidados}} convidados.".to_string());
    settings.transfer_message = Some("Um atendente vai continuar com você.".to_string());
    settings.menu_message =
        Some("1 - agendar visita | 2 - dúvidas | 3 - analisar depois".to_string());
    settings.followup_delay1_hours = 24;
    settings.followup_delay2_hours = 48;
    settings.followup_template1 = Some("Oi {{nome}}, ainda pensando?".to_string());
    settings.followup_template2 = Some("{{nome}}, últimas datas na {{unidade}}!".to_string());
    bot::save_settings(db, &settings).await.unwrap();

    for (key, pos, question, confirmation) in [
        ("tipo", 1, "Você já é cliente ou quer fazer um evento?", None),
        ("nome", 2, "Qual o seu nome?", Some("Prazer, {{resposta}}!")),
        ("mes", 3, "Para qual mês seria a festa?", None),
        ("convidados", 4, "Quantos convidados?", None),
    ] {
        bot::save_step(db, &step_fixture(key, pos, question, confirmation))
            .await
            .unwrap();
    }
}

/// Build the webhook JSON the gateway would deliver for one inbound text.
fn inbound_json(external_id: &str, text: &str) -> String {
    serde_json::json!({
        "event": "messages.upsert",
        "instance": "central",
        "data": {
            "key": {
                "remoteJid": "5511999990000@s.whatsapp.net",
                "fromMe": false,
                "id": external_id,
            },
            "pushName": "João",
            "message": { "conversation": text },
            "messageTimestamp": Utc::now().timestamp(),
        }
    })
    .to_string()
}

/// One webhook delivery: parse, ingest, dispatch to the bot.
async fn deliver(
    db: &Database,
    config: &ZapfunilConfig,
    engine: &BotEngine,
    external_id: &str,
    text: &str,
) -> Option<BotOutcome> {
    let envelope: WebhookEnvelope =
        serde_json::from_str(&inbound_json(external_id, text)).unwrap();
    let event = webhook::to_inbound_event(&envelope).unwrap();
    let outcome = process_event(db, config, event).await.unwrap();

    let IngestOutcome::Message {
        conversation,
        bot_input: Some(input),
        ..
    } = outcome
    else {
        return None;
    };
    Some(engine.handle_inbound(&conversation, &input).await.unwrap())
}

#[tokio::test]
async fn full_pipeline_from_first_contact_to_second_followup() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("e2e.db");
    let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
    seed(&db).await;

    let config = config();
    let gateway = RecordingGateway::new();
    let engine = BotEngine::new(db.clone(), Arc::new(gateway.clone()), config.clone());
    let scheduler = FollowupScheduler::new(db.clone(), Arc::new(gateway.clone()));

    // -- Qualification dialog -------------------------------------------
    let outcome = deliver(&db, &config, &engine, "e1", "oi, queria saber dos preços").await;
    assert_eq!(outcome, Some(BotOutcome::Started));

    deliver(&db, &config, &engine, "e2", "quero fazer um evento").await;
    deliver(&db, &config, &engine, "e3", "João").await;
    deliver(&db, &config, &engine, "e4", "março").await;
    let outcome = deliver(&db, &config, &engine, "e5", "120").await;
    let Some(BotOutcome::Completed { lead_id }) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };

    let lead = leads::get_lead(&db, &lead_id).await.unwrap().unwrap();
    assert_eq!(lead.name, "João");
    assert_eq!(lead.target_month.as_deref(), Some("março"));
    assert_eq!(lead.guest_count, Some(120));
    assert_eq!(lead.status, LeadStatus::Novo);

    // Question sequence went out exactly in the configured order.
    let texts = gateway.sent_texts().await;
    let questions: Vec<&String> = texts.iter().filter(|t| t.ends_with('?')).collect();
    assert_eq!(questions.len(), 4);
    assert_eq!(
        texts.iter().filter(|t| t.starts_with("Perfeito, João")).count(),
        1
    );

    // -- Gateway redelivery of an already-seen event is harmless --------
    let redelivered = deliver(&db, &config, &engine, "e5", "120").await;
    assert!(redelivered.is_none(), "retry never reaches the bot");

    // -- Menu: analyze later arms the follow-up -------------------------
    let outcome = deliver(&db, &config, &engine, "e6", "3").await;
    assert_eq!(
        outcome,
        Some(BotOutcome::MenuResolved(MenuChoice::AnalyzeLater))
    );
    let followup = followups::get(&db, &lead_id).await.unwrap().unwrap();

    // -- Follow-up stages, measured from the arming event ---------------
    let armed_at = chrono::DateTime::parse_from_rfc3339(&followup.armed_at)
        .unwrap()
        .with_timezone(&Utc);

    gateway.clear().await;
    let report = scheduler.run_due(armed_at + Duration::hours(23)).await.unwrap();
    assert!(report.stage1_sent.is_empty());

    let report = scheduler.run_due(armed_at + Duration::hours(25)).await.unwrap();
    assert_eq!(report.stage1_sent, vec![lead_id.clone()]);

    let report = scheduler.run_due(armed_at + Duration::hours(49)).await.unwrap();
    assert_eq!(report.stage2_sent, vec![lead_id.clone()]);

    // Re-running changes nothing: each stage fires at most once.
    let report = scheduler.run_due(armed_at + Duration::hours(72)).await.unwrap();
    assert!(report.stage1_sent.is_empty());
    assert!(report.stage2_sent.is_empty());
    assert_eq!(gateway.sent_count().await, 2);

    let texts = gateway.sent_texts().await;
    assert_eq!(texts[0], "Oi João, ainda pensando?");
    assert_eq!(texts[1], "João, últimas datas na Central!");

    // -- The audit trail reconstructs the whole journey -----------------
    let trail: Vec<String> = history::get_history(&db, &lead_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        trail,
        [
            "lead_created",
            "conversation_linked",
            "followup_armed",
            "followup_stage1_sent",
            "followup_stage2_sent",
        ]
    );

    db.close().await.unwrap();
}

#[tokio::test]
async fn existing_customer_is_handed_to_a_human() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("e2e.db");
    let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
    seed(&db).await;

    let config = config();
    let gateway = RecordingGateway::new();
    let engine = BotEngine::new(db.clone(), Arc::new(gateway.clone()), config.clone());

    deliver(&db, &config, &engine, "e1", "oi").await;
    let outcome = deliver(&db, &config, &engine, "e2", "já sou cliente").await;
    assert_eq!(outcome, Some(BotOutcome::Transferred));

    // The bot stays out of this conversation from here on.
    let outcome = deliver(&db, &config, &engine, "e3", "alguém aí?").await;
    assert_eq!(outcome, Some(BotOutcome::NotApplicable));
    assert!(leads::list_leads(&db, None).await.unwrap().is_empty());

    db.close().await.unwrap();
}
