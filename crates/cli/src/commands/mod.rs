//! Command implementations, one module per subcommand.

pub mod chat;
pub mod escalations;
pub mod faq;
pub mod sessions;

use anyhow::{bail, Result};
use deskclaw_backends::build_backend;
use deskclaw_config::AppConfig;
use deskclaw_engine::Orchestrator;
use deskclaw_store::SqliteStore;
use std::sync::Arc;
use tracing::info;

/// Open the configured SQLite store, running migrations and seeding the
/// default FAQ set when enabled.
pub async fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let store = Arc::new(SqliteStore::new(&config.store.path).await?);
    if config.store.seed_faqs {
        let seeded = store.seed_faqs().await?;
        if seeded > 0 {
            info!(count = seeded, "Seeded default FAQ entries");
        }
    }
    Ok(store)
}

/// Wire the full pipeline on top of an open store.
pub fn build_pipeline(config: &AppConfig, store: &Arc<SqliteStore>) -> Orchestrator {
    Orchestrator::new(
        config,
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        build_backend(config),
    )
}

/// Write a default config file, refusing to clobber one unless forced.
pub fn init(force: bool) -> Result<()> {
    let dir = AppConfig::config_dir();
    std::fs::create_dir_all(&dir)?;

    let path = dir.join("config.toml");
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote {}", path.display());
    Ok(())
}
