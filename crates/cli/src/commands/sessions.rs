//! Session listing, reports, and shutdown.

use anyhow::{bail, Result};
use deskclaw_config::AppConfig;
use deskclaw_core::session::SessionId;
use deskclaw_core::store::SessionStore;
use deskclaw_engine::context::CommunicationStyle;

pub async fn list() -> Result<()> {
    let config = AppConfig::load()?;
    let store = super::open_store(&config).await?;

    let sessions = store.list_active().await?;
    if sessions.is_empty() {
        println!("No active sessions.");
        return Ok(());
    }
    for session in sessions {
        println!(
            "{}  user {:<12} updated {}",
            session.id,
            session.user_id.as_deref().unwrap_or("-"),
            session.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn summary(session: String) -> Result<()> {
    let config = AppConfig::load()?;
    let store = super::open_store(&config).await?;
    let bot = super::build_pipeline(&config, &store);

    let sid = SessionId::from(&session);
    if store.find(&sid).await?.is_none() {
        bail!("no session with id {session}");
    }

    let Some(report) = bot.session_summary(&sid).await else {
        bail!("failed to build a report for session {session}");
    };

    println!("Session {}", report.session_id);
    println!("  status:   {}", report.status);
    println!("  summary:  {}", report.conversation_summary);
    println!(
        "  messages: {} total ({} customer, {} bot)",
        report.message_stats.total, report.message_stats.user_turns, report.message_stats.bot_turns
    );
    let style = match report.user_preferences.communication_style {
        CommunicationStyle::Formal => "formal",
        CommunicationStyle::Informal => "informal",
    };
    println!("  style:    {style}");
    if !report.user_preferences.topic_interests.is_empty() {
        println!(
            "  topics:   {}",
            report.user_preferences.topic_interests.join(", ")
        );
    }
    if let Some(last) = report.last_activity {
        println!("  last activity: {}", last.format("%Y-%m-%d %H:%M:%S"));
    }
    if report.escalations.is_empty() {
        println!("  escalations: none");
    } else {
        println!("  escalations:");
        for ticket in &report.escalations {
            println!("    #{:<4} {:<12} {}", ticket.id, ticket.status, ticket.reason);
        }
    }
    Ok(())
}

pub async fn end(session: String) -> Result<()> {
    let config = AppConfig::load()?;
    let store = super::open_store(&config).await?;
    let bot = super::build_pipeline(&config, &store);

    let sid = SessionId::from(&session);
    if store.find(&sid).await?.is_none() {
        bail!("no session with id {session}");
    }

    let end = bot.end_session(&sid).await?;
    println!(
        "Ended session {} ({} messages).",
        end.session_id, end.message_count
    );
    println!("{}", end.summary);
    Ok(())
}
