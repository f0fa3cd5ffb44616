//! The message pipeline: escalation check, FAQ lookup, generated reply.
//!
//! `process_message` is the single entry point. It always returns a
//! well-formed [`Outcome`], absorbing collaborator failures into an
//! apology rather than surfacing an error to the channel layer. The
//! decision order is strict: escalation beats FAQ beats generation.

use chrono::Utc;
use deskclaw_config::AppConfig;
use deskclaw_core::backend::GenerationBackend;
use deskclaw_core::error::{Error, Result};
use deskclaw_core::escalation::{Escalation, EscalationCategory};
use deskclaw_core::outcome::{Outcome, OutcomeDetail, OutcomeKind};
use deskclaw_core::session::{Session, SessionId, SessionPatch};
use deskclaw_core::store::{EscalationStore, FaqStore, SessionStore, TurnStore};
use deskclaw_core::turn::{Role, TurnKind, TurnStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::context::{CommunicationStyle, ContextManager, RelevantContext, UserPreferences};
use crate::escalation::{Decision, EscalationClassifier};
use crate::faq::{FaqMatch, FaqMatcher};

/// How much history the escalation classifier sees.
const CLASSIFIER_HISTORY: usize = 20;

/// A generated reply below this confidence triggers the clarification
/// follow-up; an FAQ match below it is discarded.
const LOW_CONFIDENCE: f32 = 0.4;

/// Apology returned when the pipeline itself fails.
const ERROR_APOLOGY: &str = "I apologize, but I'm experiencing technical difficulties at the \
     moment. Please try again in a few moments, or I can connect you with a human agent for \
     immediate assistance.";

/// Fallback shown when an escalation was warranted but the ticket could
/// not be created.
const ESCALATION_FALLBACK: &str = "I understand you need additional assistance. While I'm \
     having trouble creating your support ticket right now, please know that your inquiry is \
     important to us. You can also contact our support team directly at support@company.com \
     or call (555) 123-4567.";

const FAQ_FOLLOW_UP: &str = "\n\nIs there anything else I can help you with regarding this topic?";

/// The session-level report returned by `session_summary`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub conversation_summary: String,
    pub message_stats: TurnStats,
    pub user_preferences: UserPreferences,
    pub escalations: Vec<Escalation>,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
    /// "escalated" while any ticket is pending, "active" otherwise
    pub status: &'static str,
}

/// Returned by `end_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnd {
    pub session_id: SessionId,
    pub summary: String,
    pub message_count: usize,
    pub ended_at: chrono::DateTime<chrono::Utc>,
}

/// The support pipeline.
pub struct Orchestrator {
    sessions: Arc<dyn SessionStore>,
    turns: Arc<dyn TurnStore>,
    escalations: Arc<dyn EscalationStore>,
    context: Arc<ContextManager>,
    matcher: FaqMatcher,
    classifier: EscalationClassifier,
    backend: Arc<dyn GenerationBackend>,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        sessions: Arc<dyn SessionStore>,
        turns: Arc<dyn TurnStore>,
        faqs: Arc<dyn FaqStore>,
        escalations: Arc<dyn EscalationStore>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        let context = Arc::new(ContextManager::new(
            sessions.clone(),
            turns.clone(),
            config.context.clone(),
        ));
        Self {
            sessions,
            turns,
            escalations,
            context,
            matcher: FaqMatcher::new(faqs, config.confidence_threshold),
            classifier: EscalationClassifier::new(config.classifier.clone()),
            backend,
        }
    }

    /// The context manager, shared so the host can spawn its sweeper.
    pub fn context_manager(&self) -> &Arc<ContextManager> {
        &self.context
    }

    /// Process one customer message. Creates the session when `session_id`
    /// is absent or unknown. Never fails: internal errors collapse into
    /// an apology outcome.
    pub async fn process_message(
        &self,
        session_id: Option<&SessionId>,
        message: &str,
        user_id: Option<String>,
    ) -> Outcome {
        let session = match self.ensure_session(session_id, user_id).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Failed to resolve session");
                return self
                    .error_outcome(session_id.cloned().unwrap_or_default())
                    .await;
            }
        };
        let sid = session.id.clone();

        match self.try_process(&sid, message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(session_id = %sid, error = %e, "Pipeline failed");
                self.error_outcome(sid).await
            }
        }
    }

    async fn ensure_session(
        &self,
        session_id: Option<&SessionId>,
        user_id: Option<String>,
    ) -> Result<Session> {
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.find(id).await? {
                return Ok(session);
            }
        }
        let session = self.sessions.create(user_id, Default::default()).await?;
        info!(session_id = %session.id, "Created session");
        Ok(session)
    }

    async fn try_process(&self, sid: &SessionId, message: &str) -> Result<Outcome> {
        let relevant = self.context.relevant_context(sid, message).await?;

        self.context
            .append_turn(sid, message, Role::User, TurnKind::Text, None)
            .await?;

        let history = self.turns.full_history(sid, CLASSIFIER_HISTORY).await?;
        let decision = self.classifier.classify(message, &history);

        if decision.escalate {
            return Ok(self.handle_escalation(sid, &decision).await);
        }

        if let Some(faq) = self.matcher.best_match(message).await? {
            if faq.confidence > LOW_CONFIDENCE {
                return self.handle_faq(sid, faq, &relevant).await;
            }
        }

        self.handle_generation(sid, message, &relevant).await
    }

    async fn handle_escalation(&self, sid: &SessionId, decision: &Decision) -> Outcome {
        let ticket = match self.escalations.create(sid, &decision.reason).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(session_id = %sid, error = %e, "Escalation ticket creation failed");
                return escalation_fallback(sid);
            }
        };

        let category = EscalationCategory::from_reason(&decision.reason);
        let full_message = format!(
            "{}\n\n\u{1F3AB} Escalation Ticket: #{}\n\u{1F4DE} A human agent will be with you \
             shortly. Your current wait time is approximately 2-5 minutes.",
            category.handoff_message(),
            ticket.id
        );

        // The hand-off is only announced once its turn is on record; a
        // failed write downgrades to the direct-contact fallback (the
        // ticket itself stays).
        if let Err(e) = self
            .context
            .append_turn(
                sid,
                &full_message,
                Role::Bot,
                TurnKind::Escalation,
                Some(decision.confidence),
            )
            .await
        {
            warn!(session_id = %sid, error = %e, "Failed to record escalation turn");
            return escalation_fallback(sid);
        }

        info!(
            session_id = %sid,
            ticket_id = ticket.id,
            priority = decision.priority.as_str(),
            "Escalated to human agent"
        );

        Outcome {
            session_id: sid.clone(),
            message: full_message,
            kind: OutcomeKind::Escalation,
            confidence: decision.confidence,
            source: "escalation_service".into(),
            detail: Some(OutcomeDetail::Escalation {
                ticket_id: ticket.id,
                reason: decision.reason.clone(),
                priority: decision.priority,
            }),
        }
    }

    async fn handle_faq(
        &self,
        sid: &SessionId,
        faq: FaqMatch,
        relevant: &RelevantContext,
    ) -> Result<Outcome> {
        let mut reply = faq.entry.answer.clone();
        if relevant.query.user_style == CommunicationStyle::Informal {
            reply = informal_restyle(&reply);
        }
        reply.push_str(FAQ_FOLLOW_UP);

        self.context
            .append_turn(sid, &reply, Role::Bot, TurnKind::Faq, Some(faq.confidence))
            .await?;

        Ok(Outcome {
            session_id: sid.clone(),
            message: reply,
            kind: OutcomeKind::Faq,
            confidence: faq.confidence,
            source: "faq_database".into(),
            detail: Some(OutcomeDetail::Faq {
                question: faq.entry.question,
                category: faq.entry.category,
            }),
        })
    }

    async fn handle_generation(
        &self,
        sid: &SessionId,
        message: &str,
        relevant: &RelevantContext,
    ) -> Result<Outcome> {
        let window = &relevant.context.messages;
        let start = window.len().saturating_sub(5);
        let prior = &window[start..];

        let generated = self
            .backend
            .generate(message, prior)
            .await
            .map_err(Error::Backend)?;

        self.context
            .append_turn(
                sid,
                &generated.text,
                Role::Bot,
                TurnKind::Text,
                Some(generated.confidence),
            )
            .await?;

        if generated.confidence < LOW_CONFIDENCE {
            let clarification = low_confidence_reply(message);
            self.context
                .append_turn(sid, &clarification, Role::Bot, TurnKind::Text, Some(0.3))
                .await?;
        }

        Ok(Outcome {
            session_id: sid.clone(),
            message: generated.text,
            kind: OutcomeKind::LlmResponse,
            confidence: generated.confidence,
            source: generated.source,
            detail: None,
        })
    }

    async fn error_outcome(&self, sid: SessionId) -> Outcome {
        // Best effort; the apology is returned either way.
        if let Err(e) = self
            .context
            .append_turn(&sid, ERROR_APOLOGY, Role::Bot, TurnKind::Error, Some(0.1))
            .await
        {
            warn!(session_id = %sid, error = %e, "Failed to record error turn");
        }

        Outcome {
            session_id: sid,
            message: ERROR_APOLOGY.into(),
            kind: OutcomeKind::Error,
            confidence: 0.1,
            source: "error_handler".into(),
            detail: None,
        }
    }

    /// Session-level report: summary, stats, preferences, and tickets.
    /// `None` when any collaborator fails.
    pub async fn session_summary(&self, sid: &SessionId) -> Option<SessionSummary> {
        let report = async {
            let context = self.context.get_context(sid).await?;
            let stats = self.turns.summary_stats(sid).await?;
            let escalations = self.escalations.list_by_session(sid).await?;

            let status = if escalations
                .iter()
                .any(|e| e.status == deskclaw_core::escalation::EscalationStatus::Pending)
            {
                "escalated"
            } else {
                "active"
            };

            Ok::<_, deskclaw_core::error::StoreError>(SessionSummary {
                session_id: sid.clone(),
                conversation_summary: context.conversation_summary,
                message_stats: stats,
                user_preferences: context.user_preferences,
                escalations,
                last_activity: context.last_activity,
                status,
            })
        }
        .await;

        match report {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(session_id = %sid, error = %e, "Failed to build session summary");
                None
            }
        }
    }

    /// End a session: summarize it, mark it inactive, record the summary
    /// in the session metadata, and drop the cached context.
    pub async fn end_session(&self, sid: &SessionId) -> Result<SessionEnd> {
        let context = self.context.get_context(sid).await?;

        let summary = match self.backend.summarize(&context.messages).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(session_id = %sid, error = %e, "Summarize failed, using fallback");
                deskclaw_core::backend::fallback_summary(&context.messages)
            }
        };

        self.sessions.end(sid).await?;

        let ended_at = Utc::now();
        let mut metadata = context.session_metadata.clone();
        metadata.insert("final_summary".into(), serde_json::json!(summary));
        metadata.insert("ended_at".into(), serde_json::json!(ended_at.to_rfc3339()));
        metadata.insert(
            "total_messages".into(),
            serde_json::json!(context.message_count),
        );
        self.sessions
            .update(sid, SessionPatch::metadata(metadata))
            .await?;

        self.context.invalidate(sid).await;
        info!(session_id = %sid, "Ended session");

        Ok(SessionEnd {
            session_id: sid.clone(),
            summary,
            message_count: context.message_count,
            ended_at,
        })
    }
}

/// Outcome returned when an escalation was warranted but could not be
/// fully recorded.
fn escalation_fallback(sid: &SessionId) -> Outcome {
    Outcome {
        session_id: sid.clone(),
        message: ESCALATION_FALLBACK.into(),
        kind: OutcomeKind::EscalationError,
        confidence: 0.5,
        source: "fallback".into(),
        detail: None,
    }
}

/// Loosen a formal canned answer for customers who write informally.
fn informal_restyle(text: &str) -> String {
    text.replace("You can", "You can just")
        .replace("Please", "Just")
        .replace("Thank you", "Thanks")
        .replace(". ", ". \u{1F60A} ")
}

fn low_confidence_reply(message: &str) -> String {
    format!(
        "I want to make sure I give you accurate information about \"{message}\". Let me \
         connect you with one of our specialists who can provide you with detailed assistance. \
         Alternatively, you can browse our help documentation or try rephrasing your question."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informal_restyle_rewrites_stock_phrases() {
        let restyled = informal_restyle("You can cancel anytime. Please contact us.");
        assert!(restyled.contains("You can just cancel"));
        assert!(restyled.contains("Just contact us"));
        assert!(restyled.contains('\u{1F60A}'));
    }

    #[test]
    fn low_confidence_reply_quotes_the_message() {
        let reply = low_confidence_reply("quantum flux capacitor");
        assert!(reply.contains("\"quantum flux capacitor\""));
        assert!(reply.contains("rephrasing"));
    }
}
