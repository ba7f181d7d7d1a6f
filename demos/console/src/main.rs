//! Console Host
//!
//! Seeds an in-memory record store from a JSON file, starts the selected
//! bots and keeps them connected until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the gateway configured in botkeeper.toml
//! cargo run --package botkeeper-console -- --seed demos/console/bots.json
//!
//! # Offline, against the loopback gateway
//! cargo run --package botkeeper-console -- --seed demos/console/bots.json --loopback
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use botkeeper::core::{Bot, BotId, BoxedConnector, MemoryStore, RecordStore, Requester};
use botkeeper::gateway::MemoryConnector;
use botkeeper::runtime::config::validate_config;
use botkeeper::runtime::{ApiError, ConfigLoader, Supervisor};
use clap::Parser;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "botkeeper-console", version, about)]
struct Args {
    /// Configuration file (defaults to searching for botkeeper.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "production" (defaults to BOTKEEPER_PROFILE)
    #[arg(short, long)]
    profile: Option<String>,

    /// JSON array of bot records to load
    #[arg(short, long)]
    seed: PathBuf,

    /// Use the in-process loopback gateway instead of WebSocket
    #[arg(long)]
    loopback: bool,

    /// Bots to start; every seeded bot when empty
    bots: Vec<String>,
}

async fn seed_store(path: &PathBuf) -> Result<(Arc<MemoryStore>, Vec<BotId>)> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let bots: Vec<Bot> = serde_json::from_str(&raw).context("parsing seed file")?;

    let store = Arc::new(MemoryStore::new());
    let ids = bots.iter().map(|bot| bot.id.clone()).collect();
    for bot in bots {
        store.insert_bot(bot);
    }
    Ok((store, ids))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let config = loader.load()?;
    validate_config(&config)?;

    let (store, seeded) = seed_store(&args.seed).await?;
    let connector: BoxedConnector = if args.loopback {
        Arc::new(MemoryConnector::new())
    } else {
        Arc::new(config.gateway.ws_connector(config.runtime.event_buffer))
    };

    // Logging is initialized here; nothing above logs
    let supervisor = Supervisor::from_config(&config, store.clone(), connector);

    let targets: Vec<BotId> = if args.bots.is_empty() {
        seeded
    } else {
        args.bots.into_iter().map(BotId::from).collect()
    };

    let operator = Requester::admin("console");
    for bot_id in &targets {
        match supervisor.start(bot_id, &operator).await {
            Ok(report) => info!(bot_id = %report.bot_id, status = %report.status, "Bot started"),
            Err(e) => {
                let body = serde_json::to_string(&ApiError::from(&e))?;
                error!(bot_id = %bot_id, error = %body, "Failed to start bot");
            }
        }
    }

    supervisor.run().await;

    for bot_id in &targets {
        if let Ok(bot) = store.load(bot_id).await {
            info!(
                bot_id = %bot.id,
                status = %bot.status,
                messages = bot.statistics.message_count,
                commands = bot.statistics.commands_used,
                "Final statistics"
            );
        }
    }

    Ok(())
}
