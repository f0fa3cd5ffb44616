//! Interactive and one-shot chat against the pipeline.

use anyhow::Result;
use deskclaw_config::AppConfig;
use deskclaw_core::outcome::{Outcome, OutcomeKind};
use deskclaw_core::session::SessionId;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    session: Option<String>,
    message: Option<String>,
    user: Option<String>,
) -> Result<()> {
    let config = AppConfig::load()?;
    let store = super::open_store(&config).await?;
    let bot = super::build_pipeline(&config, &store);

    let session_id = session.map(|s| SessionId::from(&s));

    // One-shot mode: process a single message and print the reply.
    if let Some(message) = message {
        let outcome = bot
            .process_message(session_id.as_ref(), &message, user)
            .await;
        print_outcome(&outcome);
        println!("(session {})", outcome.session_id);
        return Ok(());
    }

    bot.context_manager().spawn_sweeper();

    println!("╭───────────────────────────────────────────────╮");
    println!("│  {}  │  exit or quit to leave", config.bot_name);
    println!("╰───────────────────────────────────────────────╯");

    let mut current = session_id;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nYou > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let outcome = bot.process_message(current.as_ref(), input, user.clone()).await;
        if current.is_none() {
            println!("(session {})", outcome.session_id);
        }
        current = Some(outcome.session_id.clone());
        print_outcome(&outcome);
    }

    // Close the conversation so the final summary lands in the session
    // metadata.
    if let Some(sid) = current {
        let end = bot.end_session(&sid).await?;
        println!("\nSession ended after {} messages.", end.message_count);
        println!("{}", end.summary);
    }

    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    println!("\nBot > {}", outcome.message);
    if matches!(outcome.kind, OutcomeKind::Faq | OutcomeKind::LlmResponse) {
        println!("      [{} | confidence {:.2}]", outcome.source, outcome.confidence);
    }
}
