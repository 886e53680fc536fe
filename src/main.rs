mod bot;
mod commands;
mod config;
mod proto;
mod reputation;
mod seen;

use crate::bot::dispatch::RegistryBuilder;
use crate::bot::Bot;
use crate::reputation::{HttpReputation, ReputationLookup};
use crate::seen::{JsonSeenStore, MemorySeenStore, SeenStore};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "modbot exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = config::load(config_path.as_deref())?;
    info!(
        server = %cfg.server.host,
        port = cfg.server.port,
        nick = %cfg.server.nickname,
        "starting modbot"
    );

    let seen_path = cfg.seen.path.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("modbot")
            .join("seen.json")
    });
    let seen: Arc<dyn SeenStore> = match JsonSeenStore::open(seen_path.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(
                path = %seen_path.display(),
                error = %e,
                "seen store unavailable, tracking in memory only"
            );
            Arc::new(MemorySeenStore::default())
        }
    };
    let reputation: Arc<dyn ReputationLookup> = Arc::new(HttpReputation::new(&cfg.reputation));

    let registry =
        commands::register_builtins(RegistryBuilder::new(), &cfg, seen.clone(), reputation)?
            .build();
    info!(
        commands = registry.len(),
        names = %registry.names().join(", "),
        "registered commands"
    );

    Bot::new(cfg, registry, seen).run().await
}
