//! Escalation ticket administration.

use anyhow::{anyhow, Result};
use deskclaw_config::AppConfig;
use deskclaw_core::escalation::EscalationStatus;
use deskclaw_core::store::EscalationStore;

use crate::EscalationCommands;

pub async fn run(command: EscalationCommands) -> Result<()> {
    let config = AppConfig::load()?;
    let store = super::open_store(&config).await?;

    match command {
        EscalationCommands::List { status } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let tickets = store.list_all(status).await?;
            if tickets.is_empty() {
                println!("No escalation tickets.");
                return Ok(());
            }
            for ticket in tickets {
                println!(
                    "#{:<4} {:<12} {}  session {}",
                    ticket.id,
                    ticket.status,
                    ticket.created_at.format("%Y-%m-%d %H:%M"),
                    ticket.session_id
                );
                println!("      {}", ticket.reason);
                if let Some(agent) = &ticket.resolved_by {
                    println!("      resolved by {agent}");
                }
            }
        }
        EscalationCommands::Update { id, status, agent } => {
            let status = parse_status(&status)?;
            store.update_status(id, status, agent.as_deref()).await?;
            println!("Ticket #{id} -> {status}");
        }
        EscalationCommands::Stats { days } => {
            let stats = store.stats(days).await?;
            println!("Escalations over the last {days} days:");
            println!("  total        {}", stats.total);
            println!("  pending      {}", stats.pending);
            println!("  in progress  {}", stats.in_progress);
            println!("  resolved     {}", stats.resolved);
            if let Some(avg) = stats.avg_resolution_days {
                println!("  avg resolution {avg:.1} days");
            }
        }
    }

    Ok(())
}

fn parse_status(s: &str) -> Result<EscalationStatus> {
    EscalationStatus::parse(s).ok_or_else(|| {
        anyhow!("unknown status '{s}' (expected pending, in_progress, or resolved)")
    })
}
