//! sims-import - Bulk user import service
//!
//! Accepts batches of new teacher, student and parent accounts from the
//! admin dashboard and creates them in the hosted backend.

use anyhow::{Context, Result};
use clap::Parser;
use sims_common::config::{ConfigOverrides, ServiceConfig, StoreBackend};
use sims_import::services::{
    GoTrueClient, IdentityProvider, PgStore, PostgrestStore, RelationalStore,
};
use sims_import::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sims-import", version, about = "Bulk user import service")]
struct Args {
    /// TOML config file (default: <config dir>/sims/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            bind: self.bind.clone(),
            port: self.port,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config =
        ServiceConfig::resolve(&args.overrides()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting SIMS bulk import (sims-import) v{}", env!("CARGO_PKG_VERSION"));
    match &config.config_file {
        Some(path) => info!("Config file: {}", path.display()),
        None => warn!("No config file found, using environment and defaults"),
    }

    let identity: Arc<dyn IdentityProvider> = Arc::new(GoTrueClient::new(
        &config.supabase_url,
        &config.service_role_key,
        config.http_timeout,
    )?);

    let store: Arc<dyn RelationalStore> = match config.store_backend {
        StoreBackend::Rest => {
            info!("Relational store: PostgREST at {}", config.supabase_url);
            Arc::new(PostgrestStore::new(
                &config.supabase_url,
                &config.service_role_key,
                config.http_timeout,
            )?)
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("Postgres store selected without a database URL")?;
            let store = PgStore::connect(url)
                .await
                .context("Failed to connect to database")?;
            info!("✓ Connected to database");
            Arc::new(store)
        }
    };

    let app = build_router(AppState::new(identity, store));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("sims-import listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
