//! deskclaw command-line interface.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "deskclaw",
    about = "Customer support pipeline: FAQ answers, generated replies, human escalation",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the support bot (interactive unless -m is given)
    Chat {
        /// Resume an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message and exit
        #[arg(short, long)]
        message: Option<String>,

        /// External user identifier attached to new sessions
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Manage the FAQ knowledge base
    Faq {
        #[command(subcommand)]
        command: FaqCommands,
    },

    /// Inspect and update escalation tickets
    Escalations {
        #[command(subcommand)]
        command: EscalationCommands,
    },

    /// List active sessions
    Sessions,

    /// Show a session report
    Summary {
        /// Session ID
        session: String,
    },

    /// End a session and record its final summary
    End {
        /// Session ID
        session: String,
    },

    /// Write a default config file to ~/.deskclaw/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum FaqCommands {
    /// List FAQ entries
    List {
        /// Only show entries in this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Add a new FAQ entry
    Add {
        question: String,
        answer: String,

        /// Comma-separated keyword list
        #[arg(short, long, default_value = "")]
        keywords: String,

        #[arg(short, long, default_value = "general")]
        category: String,

        /// Higher priority wins ties during matching
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
    },

    /// Delete an FAQ entry by ID
    Delete { id: i64 },

    /// List categories with entry counts
    Categories,
}

#[derive(Subcommand)]
enum EscalationCommands {
    /// List escalation tickets
    List {
        /// Filter by status: pending, in_progress, or resolved
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Move a ticket to a new status
    Update {
        id: i64,

        /// New status: in_progress or resolved
        status: String,

        /// Agent identifier recorded at resolution
        #[arg(short, long)]
        agent: Option<String>,
    },

    /// Aggregate statistics over a trailing window
    Stats {
        /// Window size in days
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat {
            session,
            message,
            user,
        } => commands::chat::run(session, message, user).await,
        Commands::Faq { command } => commands::faq::run(command).await,
        Commands::Escalations { command } => commands::escalations::run(command).await,
        Commands::Sessions => commands::sessions::list().await,
        Commands::Summary { session } => commands::sessions::summary(session).await,
        Commands::End { session } => commands::sessions::end(session).await,
        Commands::Init { force } => commands::init(force),
    }
}
