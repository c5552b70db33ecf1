use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{normalize_database_url, DEFAULT_DATABASE_URL},
    CommandHistoryStore, Settings, TomlConfigSource, HISTORY_STORAGE_KEY,
};
use shared::CommandHistoryItem;
use storage::{KeyValueStore, SqliteKvStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Inspect and maintain the persisted command history.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = DEFAULT_DATABASE_URL)]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Most used commands first.
    Frequent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Most recently used commands first.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Stats,
    /// Zero the per-session counters.
    ResetSession,
    /// Remove every history item.
    Clear,
    /// Print the persisted history as JSON.
    Export,
    /// Check a connection config file.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Validate { config } = &cli.command {
        return validate(config);
    }

    let database_url = normalize_database_url(&cli.database_url);
    let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteKvStore::new(&database_url).await?);
    let history = CommandHistoryStore::new(Arc::clone(&storage));
    history.load().await;

    match cli.command {
        Command::Frequent { limit } => print_items(&history.get_frequent(limit)),
        Command::Recent { limit } => print_items(&history.get_recent(limit)),
        Command::Stats => {
            // Loading starts a new session, so the previous run's session
            // counters are only visible in the persisted items.
            let persisted = persisted_items(storage.as_ref()).await?;
            println!("items={}", history.len());
            println!("lifetime_executions={}", history.total_lifetime_executions());
            println!(
                "last_session_executions={}",
                persisted.iter().map(|item| item.session_count).sum::<u64>()
            );
        }
        Command::ResetSession => {
            history.clear_session_counts().await;
            info!(database_url = %database_url, "session counters reset");
        }
        Command::Clear => {
            history.clear_all().await;
            info!(database_url = %database_url, "command history cleared");
        }
        Command::Export => {
            let persisted = persisted_items(storage.as_ref()).await?;
            if persisted.is_empty() {
                info!("no persisted history found");
            }
            println!("{}", serde_json::to_string_pretty(&persisted)?);
        }
        Command::Validate { .. } => {}
    }

    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let source = TomlConfigSource::from_path(path)?;
    let settings = Settings::from_source(&source);
    let errors = settings.connection.validate();

    println!("url={}", settings.connection.ws_url());
    println!("auto_connect={}", settings.auto_connect);
    println!("settle_delay_ms={}", settings.settle_delay.as_millis());

    if errors.is_empty() {
        println!("config is valid");
        return Ok(());
    }
    for error in &errors {
        println!("error: {error}");
    }
    bail!("config has {} problem(s)", errors.len())
}

async fn persisted_items(storage: &dyn KeyValueStore) -> Result<Vec<CommandHistoryItem>> {
    let Some(raw) = storage.get(HISTORY_STORAGE_KEY).await? else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&raw).context("persisted command history is not valid JSON")
}

fn print_items(items: &[CommandHistoryItem]) {
    if items.is_empty() {
        println!("no commands recorded");
        return;
    }
    for item in items {
        println!(
            "{:>5} uses  last={}  {}",
            item.use_count,
            item.last_used.to_rfc3339(),
            item.description()
        );
    }
}
