// SPDX-FileCopyrightText: 2026 Zapfunil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The qualification session state machine.
//!
//! On each inbound text the engine decides whether bot processing applies,
//! then advances the conversation's session: consume the answer, send the
//! confirmation and the next question, and only then persist the moved
//! pointer. The last step sends the completion text and the next-step
//! menu, collapses the collected answers into a lead, and leaves the
//! session in the `menu` state until the contact picks an option.

use std::sync::Arc;
use std::time::Duration;

use regex::RegexBuilder;
use tracing::{debug, info, warn};
use zapfunil_core::types::MENU_STEP;
use zapfunil_core::{
    template, BotSession, BotSettings, BotStep, Conversation, MessageGateway, ZapfunilError,
};
use zapfunil_config::ZapfunilConfig;
use zapfunil_followup::FollowupScheduler;
use zapfunil_pipeline::NewLead;
use zapfunil_storage::models::now_utc;
use zapfunil_storage::queries::history::actions;
use zapfunil_storage::queries::{bot, conversations};
use zapfunil_storage::Database;

/// Step key whose answer is classified for the existing-customer branch.
const TYPE_STEP: &str = "tipo";

/// What the engine did with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotOutcome {
    /// Bot processing does not apply to this conversation.
    NotApplicable,
    /// A new session was opened and the first question sent.
    Started,
    /// The answer was stored and the next question sent.
    Advanced { next_step: String },
    /// Existing customer detected: transfer text sent, bot disabled here.
    Transferred,
    /// All steps answered: lead created, completion and menu sent.
    Completed { lead_id: String },
    /// A next-step menu option was applied.
    MenuResolved(MenuChoice),
    /// The menu reply matched no option; left for human attention.
    MenuUnrecognized,
}

/// The closed set of next-step menu options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// "1" -- wants to schedule a visit.
    Visit,
    /// "2" -- has questions, wants a human.
    Questions,
    /// "3" -- will analyze later; arms the follow-up scheduler.
    AnalyzeLater,
}

/// Drives qualification sessions for every conversation.
pub struct BotEngine {
    db: Database,
    gateway: Arc<dyn MessageGateway>,
    config: Arc<ZapfunilConfig>,
    followups: FollowupScheduler,
}

impl BotEngine {
    pub fn new(
        db: Database,
        gateway: Arc<dyn MessageGateway>,
        config: Arc<ZapfunilConfig>,
    ) -> Self {
        let followups = FollowupScheduler::new(db.clone(), gateway.clone());
        Self {
            db,
            gateway,
            config,
            followups,
        }
    }

    /// Process one inbound text for a conversation.
    pub async fn handle_inbound(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> Result<BotOutcome, ZapfunilError> {
        let settings = bot::get_settings(&self.db).await?;

        if !self.applies(conversation, &settings).await? {
            return Ok(BotOutcome::NotApplicable);
        }

        let steps = bot::list_steps(&self.db, true).await?;
        if steps.is_empty() {
            warn!("bot enabled but no active steps configured");
            return Ok(BotOutcome::NotApplicable);
        }

        match bot::get_session(&self.db, &conversation.id).await? {
            None => {
                // Already-qualified conversations get no new session; an
                // in-flight session (incl. the menu state after linking)
                // still advances above.
                if conversation.lead_id.is_some() {
                    return Ok(BotOutcome::NotApplicable);
                }
                self.start_session(conversation, &steps).await
            }
            Some(session) if session.current_step == MENU_STEP => {
                self.resolve_menu(conversation, text).await
            }
            Some(session) => {
                self.advance(conversation, &settings, &steps, session, text)
                    .await
            }
        }
    }

    /// Applicability gate: global toggle or test number, VIP exemption,
    /// and the per-conversation override (falling back to the instance
    /// policy).
    async fn applies(
        &self,
        conversation: &Conversation,
        settings: &BotSettings,
    ) -> Result<bool, ZapfunilError> {
        let test_match = settings
            .test_number
            .as_deref()
            .is_some_and(|n| n == conversation.phone);
        if !settings.enabled && !test_match {
            return Ok(false);
        }

        if bot::is_vip(&self.db, &conversation.phone).await? {
            debug!(phone = %conversation.phone, "vip number, bot bypassed");
            return Ok(false);
        }

        let instance_default = self
            .config
            .instance(&conversation.instance_id)
            .map(|i| i.bot_default)
            .unwrap_or(true);
        Ok(conversation.bot_enabled.unwrap_or(instance_default))
    }

    /// Open a session at the first step and ask its question. The session
    /// row is written only after the question went out.
    async fn start_session(
        &self,
        conversation: &Conversation,
        steps: &[BotStep],
    ) -> Result<BotOutcome, ZapfunilError> {
        let first = &steps[0];
        self.gateway
            .send_text(&conversation.instance_id, &conversation.phone, &first.question)
            .await?;

        let session = BotSession {
            conversation_id: conversation.id.clone(),
            current_step: first.step_key.clone(),
            answers: serde_json::Map::new(),
            existing_customer: false,
            created_at: now_utc(),
            updated_at: now_utc(),
        };
        bot::put_session(&self.db, &session).await?;

        info!(conversation_id = %conversation.id, step = %first.step_key, "qualification started");
        Ok(BotOutcome::Started)
    }

    /// Consume the answer for the current step and move the session.
    async fn advance(
        &self,
        conversation: &Conversation,
        settings: &BotSettings,
        steps: &[BotStep],
        mut session: BotSession,
        answer: &str,
    ) -> Result<BotOutcome, ZapfunilError> {
        if session.existing_customer {
            // The branch was detected earlier but the transfer send failed;
            // finish the handoff instead of consuming this as an answer.
            return self.transfer(conversation, settings).await;
        }

        let Some(idx) = steps.iter().position(|s| s.step_key == session.current_step) else {
            // The admin removed or disabled the step mid-flight. Keep the
            // session where it is for manual recovery.
            warn!(
                conversation_id = %conversation.id,
                step = %session.current_step,
                "session points at a step no longer in the active sequence"
            );
            return Ok(BotOutcome::NotApplicable);
        };
        let step = &steps[idx];

        if step.step_key == TYPE_STEP && self.is_existing_customer(settings, answer) {
            session.existing_customer = true;
            session.updated_at = now_utc();
            // Persist the branch first: a failed transfer send must not
            // lose the classification.
            bot::put_session(&self.db, &session).await?;
            return self.transfer(conversation, settings).await;
        }

        session.answers.insert(
            step.step_key.clone(),
            serde_json::Value::String(answer.trim().to_string()),
        );
        let vars = template::answer_vars(&session.answers, Some(answer.trim()));

        if let Some(confirmation) = &step.confirmation {
            self.gateway
                .send_text(
                    &conversation.instance_id,
                    &conversation.phone,
                    &template::render(confirmation, &vars),
                )
                .await?;
        }

        let last_step = idx + 1 == steps.len();
        if last_step {
            return self.complete(conversation, settings, session).await;
        }

        let next = &steps[idx + 1];
        self.gateway
            .send_text(
                &conversation.instance_id,
                &conversation.phone,
                &template::render(&next.question, &vars),
            )
            .await?;

        session.current_step = next.step_key.clone();
        session.updated_at = now_utc();
        bot::put_session(&self.db, &session).await?;

        debug!(conversation_id = %conversation.id, step = %next.step_key, "session advanced");
        Ok(BotOutcome::Advanced {
            next_step: next.step_key.clone(),
        })
    }

    /// Classify a reply against the configured existing-customer pattern.
    fn is_existing_customer(&self, settings: &BotSettings, answer: &str) -> bool {
        match RegexBuilder::new(&settings.existing_customer_pattern)
            .case_insensitive(true)
            .build()
        {
            Ok(re) => re.is_match(answer),
            Err(e) => {
                warn!(error = %e, "invalid existing_customer_pattern, treating as prospect");
                false
            }
        }
    }

    /// Existing-customer short circuit: transfer text, bot off for this
    /// conversation, session dropped. A human resumes from here.
    async fn transfer(
        &self,
        conversation: &Conversation,
        settings: &BotSettings,
    ) -> Result<BotOutcome, ZapfunilError> {
        let transfer_message =
            settings
                .transfer_message
                .as_deref()
                .ok_or_else(|| ZapfunilError::Template {
                    name: "transfer_message".to_string(),
                    detail: "not configured".to_string(),
                })?;

        self.gateway
            .send_text(&conversation.instance_id, &conversation.phone, transfer_message)
            .await?;

        conversations::set_bot_enabled(&self.db, &conversation.id, Some(false)).await?;
        bot::delete_session(&self.db, &conversation.id).await?;

        info!(conversation_id = %conversation.id, "existing customer, transferred to a human");
        Ok(BotOutcome::Transferred)
    }

    /// Last answer collected: send completion and menu, collapse the
    /// session into a lead, keep the session in the `menu` state.
    async fn complete(
        &self,
        conversation: &Conversation,
        settings: &BotSettings,
        mut session: BotSession,
    ) -> Result<BotOutcome, ZapfunilError> {
        let completion =
            settings
                .completion_message
                .as_deref()
                .ok_or_else(|| ZapfunilError::Template {
                    name: "completion_message".to_string(),
                    detail: "not configured".to_string(),
                })?;
        let menu = settings
            .menu_message
            .as_deref()
            .ok_or_else(|| ZapfunilError::Template {
                name: "menu_message".to_string(),
                detail: "not configured".to_string(),
            })?;

        let vars = template::answer_vars(&session.answers, None);
        self.gateway
            .send_text(
                &conversation.instance_id,
                &conversation.phone,
                &template::render(completion, &vars),
            )
            .await?;
        self.gateway
            .send_text(&conversation.instance_id, &conversation.phone, menu)
            .await?;

        let lead = zapfunil_pipeline::create_lead(
            &self.db,
            new_lead_from_answers(conversation, &session),
            None,
        )
        .await?;
        zapfunil_linker::link_system(&self.db, &conversation.id, &lead.id).await?;

        session.current_step = MENU_STEP.to_string();
        session.updated_at = now_utc();
        bot::put_session(&self.db, &session).await?;

        if settings.auto_send_materials {
            self.send_materials(conversation, settings, lead.guest_count).await;
        }

        info!(conversation_id = %conversation.id, lead_id = %lead.id, "qualification completed");
        Ok(BotOutcome::Completed { lead_id: lead.id })
    }

    /// Material sequencing is best-effort: a failure is logged and the
    /// remainder skipped, the qualification outcome stands.
    async fn send_materials(
        &self,
        conversation: &Conversation,
        settings: &BotSettings,
        guest_count: Option<i64>,
    ) {
        let Some(materials) = self.config.materials.get(&conversation.unit) else {
            debug!(unit = %conversation.unit, "no material catalog for unit");
            return;
        };
        let delay = Duration::from_secs(settings.material_delay_secs);
        if let Err(e) = crate::materials::send_materials(
            self.gateway.as_ref(),
            &conversation.instance_id,
            &conversation.phone,
            &conversation.unit,
            materials,
            guest_count,
            delay,
        )
        .await
        {
            warn!(conversation_id = %conversation.id, error = %e, "material sequence aborted");
        }
    }

    /// Interpret the reply to the next-step menu. Only the closed token
    /// set counts; anything else is left for human attention.
    async fn resolve_menu(
        &self,
        conversation: &Conversation,
        reply: &str,
    ) -> Result<BotOutcome, ZapfunilError> {
        // The completion path links the conversation before the menu is
        // answered, but the engine re-reads it to pick up the lead id.
        let lead_id = conversations::get_conversation(&self.db, &conversation.id)
            .await?
            .and_then(|c| c.lead_id);
        let Some(lead_id) = lead_id else {
            warn!(conversation_id = %conversation.id, "menu session without a linked lead");
            return Ok(BotOutcome::MenuUnrecognized);
        };

        let choice = match reply.trim() {
            "1" => MenuChoice::Visit,
            "2" => MenuChoice::Questions,
            "3" => MenuChoice::AnalyzeLater,
            other => {
                debug!(conversation_id = %conversation.id, reply = other, "unrecognized menu reply");
                return Ok(BotOutcome::MenuUnrecognized);
            }
        };

        match choice {
            MenuChoice::Visit => {
                self.record_lead_action(&lead_id, actions::VISIT_REQUESTED).await?;
            }
            MenuChoice::Questions => {
                self.record_lead_action(&lead_id, actions::HUMAN_REQUESTED).await?;
                conversations::set_bot_enabled(&self.db, &conversation.id, Some(false)).await?;
            }
            MenuChoice::AnalyzeLater => {
                self.followups.arm(&lead_id).await?;
            }
        }
        bot::delete_session(&self.db, &conversation.id).await?;

        info!(conversation_id = %conversation.id, ?choice, "menu resolved");
        Ok(BotOutcome::MenuResolved(choice))
    }

    async fn record_lead_action(
        &self,
        lead_id: &str,
        action: &'static str,
    ) -> Result<(), ZapfunilError> {
        let lead_id = lead_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                zapfunil_storage::queries::history::record_history(
                    conn, &lead_id, None, action, None, None,
                )?;
                Ok(())
            })
            .await
            .map_err(zapfunil_storage::database::map_tr_err)
    }
}

/// Build the lead from the collected answers, falling back to the
/// conversation's display name and phone where a step was not configured.
fn new_lead_from_answers(conversation: &Conversation, session: &BotSession) -> NewLead {
    let answer = |key: &str| {
        session
            .answers
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let name = answer("nome")
        .or_else(|| conversation.display_name.clone())
        .unwrap_or_else(|| conversation.phone.clone());
    let guest_count = answer("convidados").and_then(|raw| {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        digits.parse().ok()
    });

    NewLead {
        name,
        phone: conversation.phone.clone(),
        unit: conversation.unit.clone(),
        target_month: answer("mes"),
        day_preference: answer("dia"),
        guest_count,
        notes: None,
        owner: None,
    }
}
