// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Due-stage evaluation and dispatch.
//!
//! Administrator delays are clamped to the product ranges: stage 1 within
//! 1-72 hours of arming, stage 2 within 24-96 hours of arming. Stage 2
//! additionally requires stage 1 to have been sent and the lead to still
//! sit in the early pipeline columns.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use zapfunil_core::{template, Lead, LeadStatus, MessageGateway, ZapfunilError};
use zapfunil_storage::database::map_tr_err;
use zapfunil_storage::models::now_utc;
use zapfunil_storage::queries::history::{actions, record_history};
use zapfunil_storage::queries::{bot, conversations, followups, history, leads};
use zapfunil_storage::Database;

/// Outcome of one scheduler tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Lead ids whose stage 1 message went out this tick.
    pub stage1_sent: Vec<String>,
    /// Lead ids whose stage 2 message went out this tick.
    pub stage2_sent: Vec<String>,
    /// Sends that failed; left unrecorded so the next tick retries them.
    pub failures: usize,
}

/// Evaluates armed follow-ups and dispatches due stages.
pub struct FollowupScheduler {
    db: Database,
    gateway: Arc<dyn MessageGateway>,
}

impl FollowupScheduler {
    pub fn new(db: Database, gateway: Arc<dyn MessageGateway>) -> Self {
        Self { db, gateway }
    }

    /// Arm the follow-up for a lead ("analyze later").
    ///
    /// Idempotent: a second arming keeps the original timestamp and writes
    /// no duplicate history entry.
    pub async fn arm(&self, lead_id: &str) -> Result<(), ZapfunilError> {
        leads::get_lead(&self.db, lead_id)
            .await?
            .ok_or_else(|| ZapfunilError::NotFound {
                entity: "lead",
                id: lead_id.to_string(),
            })?;

        let newly_armed = followups::arm(&self.db, lead_id, &now_utc()).await?;
        if newly_armed {
            let lead_id_owned = lead_id.to_string();
            self.db
                .connection()
                .call(move |conn| {
                    record_history(
                        conn,
                        &lead_id_owned,
                        None,
                        actions::FOLLOWUP_ARMED,
                        None,
                        None,
                    )?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
            info!(lead_id, "follow-up armed");
        }
        Ok(())
    }

    /// Evaluate every armed follow-up against `now` and dispatch due stages.
    ///
    /// Safe to call from any periodic trigger at any cadence: each stage is
    /// attempted at most once per lead, and a failed send leaves no record
    /// so the next tick retries it.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<TickReport, ZapfunilError> {
        let settings = bot::get_settings(&self.db).await?;
        let delay1 = Duration::hours(settings.followup_delay1_hours.clamp(1, 72));
        let delay2 = Duration::hours(settings.followup_delay2_hours.clamp(24, 96));

        let mut report = TickReport::default();

        for followup in followups::list_armed(&self.db).await? {
            let Some(lead) = leads::get_lead(&self.db, &followup.lead_id).await? else {
                warn!(lead_id = %followup.lead_id, "armed follow-up for missing lead");
                continue;
            };
            let armed_at = match DateTime::parse_from_rfc3339(&followup.armed_at) {
                Ok(t) => t.with_timezone(&Utc),
                Err(e) => {
                    warn!(lead_id = %lead.id, error = %e, "unparseable armed_at");
                    continue;
                }
            };

            let sent1 =
                history::has_action(&self.db, &lead.id, actions::FOLLOWUP_STAGE1_SENT).await?;
            let sent2 =
                history::has_action(&self.db, &lead.id, actions::FOLLOWUP_STAGE2_SENT).await?;

            let mut stage1_done = sent1;
            if !sent1 && now >= armed_at + delay1 {
                match self
                    .dispatch_stage(&lead, settings.followup_template1.as_deref(), 1)
                    .await
                {
                    Ok(()) => {
                        self.record_sent(&lead.id, actions::FOLLOWUP_STAGE1_SENT).await?;
                        report.stage1_sent.push(lead.id.clone());
                        stage1_done = true;
                    }
                    Err(e) => {
                        warn!(lead_id = %lead.id, error = %e, "stage 1 send failed, will retry");
                        report.failures += 1;
                    }
                }
            }

            // Stage 2 eligibility is armed_at + delay2, never stage 1's send
            // time. It still requires stage 1 first and a lead that has not
            // advanced past the early columns.
            if settings.followup_stage2_enabled
                && stage1_done
                && !sent2
                && now >= armed_at + delay2
            {
                if !matches!(lead.status, LeadStatus::Novo | LeadStatus::EmContato) {
                    debug!(lead_id = %lead.id, status = %lead.status, "stage 2 skipped, lead advanced");
                    continue;
                }
                match self
                    .dispatch_stage(&lead, settings.followup_template2.as_deref(), 2)
                    .await
                {
                    Ok(()) => {
                        self.record_sent(&lead.id, actions::FOLLOWUP_STAGE2_SENT).await?;
                        report.stage2_sent.push(lead.id.clone());
                    }
                    Err(e) => {
                        warn!(lead_id = %lead.id, error = %e, "stage 2 send failed, will retry");
                        report.failures += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Render the stage template and send it through the lead's linked
    /// conversation. Nothing is recorded here -- the caller records only
    /// after this returns Ok.
    async fn dispatch_stage(
        &self,
        lead: &Lead,
        template_text: Option<&str>,
        stage: u8,
    ) -> Result<(), ZapfunilError> {
        let template_text = template_text.ok_or_else(|| ZapfunilError::Template {
            name: format!("followup_template{stage}"),
            detail: "not configured".to_string(),
        })?;

        let linked = conversations::list_for_lead(&self.db, &lead.id).await?;
        let Some(conversation) = linked.first() else {
            return Err(ZapfunilError::Gateway {
                message: format!("lead {} has no linked conversation to send through", lead.id),
                source: None,
            });
        };

        let text = template::render(template_text, &lead_vars(lead));
        self.gateway
            .send_text(&conversation.instance_id, &lead.phone, &text)
            .await?;
        Ok(())
    }

    async fn record_sent(&self, lead_id: &str, action: &'static str) -> Result<(), ZapfunilError> {
        let lead_id = lead_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                record_history(conn, &lead_id, None, action, None, None)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Template variables available to follow-up texts.
fn lead_vars(lead: &Lead) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("nome".to_string(), lead.name.clone());
    vars.insert("unidade".to_string(), lead.unit.clone());
    vars.insert(
        "mes".to_string(),
        lead.target_month.clone().unwrap_or_default(),
    );
    vars.insert(
        "convidados".to_string(),
        lead.guest_count.map(|n| n.to_string()).unwrap_or_default(),
    );
    vars
}
