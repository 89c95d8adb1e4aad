//! # aura-agent
//!
//! Aura server binary. Loads settings, opens the store, picks a generation
//! backend and serves the HTTP/WebSocket surface until ctrl-c.

#![deny(unsafe_code)]

mod backend;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use aura_core::constants::{NAME, VERSION};
use aura_runtime::Orchestrator;
use aura_server::AuraServer;
use aura_settings::{AuraSettings, load_settings_from_path, resolve_path, settings_path};
use aura_store::{AuraStore, ConnectionConfig};
use clap::Parser;

/// Aura classroom context server.
#[derive(Parser, Debug)]
#[command(name = "aura-agent", about = "Aura classroom context server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Settings file (defaults to `~/.aura/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Use the scripted demo backend instead of a real provider.
    #[arg(long)]
    mock: bool,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut AuraSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }

    fn database_path(&self, settings: &AuraSettings) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| resolve_path(&settings.storage.database_path))
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);

    if settings.logging.json {
        aura_core::logging::init_subscriber_json(&settings.logging.level);
    } else {
        aura_core::logging::init_subscriber(&settings.logging.level);
    }

    tracing::info!(version = VERSION, "starting {NAME}");

    let db_path = cli.database_path(&settings);
    ensure_parent_dir(&db_path)?;
    let store = AuraStore::open(
        &db_path,
        &ConnectionConfig {
            pool_size: settings.storage.pool_size,
            ..ConnectionConfig::default()
        },
    )
    .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database ready");

    let backend = backend::select_backend(&settings.generation, cli.mock);
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(store), backend, &settings));

    let server = AuraServer::new(&settings, orchestrator);
    let bridge = server.spawn_event_bridge();
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Aura listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle, bridge], None)
        .await;
    Ok(())
}
