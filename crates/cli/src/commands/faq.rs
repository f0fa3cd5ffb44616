//! FAQ knowledge-base administration.

use anyhow::Result;
use deskclaw_config::AppConfig;
use deskclaw_core::faq::NewFaq;
use deskclaw_core::store::FaqStore;

use crate::FaqCommands;

const LIST_LIMIT: usize = 100;

pub async fn run(command: FaqCommands) -> Result<()> {
    let config = AppConfig::load()?;
    let store = super::open_store(&config).await?;

    match command {
        FaqCommands::List { category } => {
            let entries = store.query(None, category.as_deref(), LIST_LIMIT).await?;
            if entries.is_empty() {
                println!("No FAQ entries.");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "#{:<4} [{}] priority {}  {}",
                    entry.id, entry.category, entry.priority, entry.question
                );
                println!("      {}", entry.answer);
                if !entry.keywords.is_empty() {
                    println!("      keywords: {}", entry.keywords);
                }
            }
        }
        FaqCommands::Add {
            question,
            answer,
            keywords,
            category,
            priority,
        } => {
            let entry = FaqStore::create(
                store.as_ref(),
                NewFaq {
                    question,
                    answer,
                    keywords,
                    category,
                    priority,
                },
            )
            .await?;
            println!("Added FAQ #{}: {}", entry.id, entry.question);
        }
        FaqCommands::Delete { id } => {
            if store.delete(id).await? {
                println!("Deleted FAQ #{id}");
            } else {
                println!("No FAQ entry with id {id}");
            }
        }
        FaqCommands::Categories => {
            for (name, count) in store.categories().await? {
                println!("{name:<20} {count}");
            }
        }
    }

    Ok(())
}
