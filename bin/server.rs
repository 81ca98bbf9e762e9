// Address Service - Web Server
// REST API with Axum over the SQLite registry

use adresse_service::api::{router, AppState, SharedStore};
use adresse_service::config::{init_logging, Config};
use adresse_service::{AddressService, SqliteStore, VERSION};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Address lookup server
#[derive(Parser, Debug)]
#[command(name = "adresse-server", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    init_logging(&config.logging);
    info!(version = VERSION, "starting adresse-server");

    let db_path = &config.database.path;
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {} (run `adresse-service import <seed.json>` first)",
            db_path.display()
        );
    }

    let store = SqliteStore::open(db_path, config.busy_timeout())?;
    info!(path = %db_path.display(), "database opened");

    let store: SharedStore = Arc::new(store);
    let service = AddressService::initialize(store, Utc::now())?;
    info!(
        municipalities = service.municipalities().len(),
        "municipality cache loaded"
    );

    let app = router(AppState::new(Arc::new(service), config.request_timeout()));

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
    info!(addr = %config.server.bind, "server listening");

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
