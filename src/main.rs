//! CityPulse API Server
//!
//! Run with: cargo run --bin citypulse -- [--config path/to/config.toml]
//!
//! Configuration comes from the TOML file (or the default locations) with
//! `CITYPULSE_*` environment overrides; see `citypulse --print-config`.
//! `RUST_LOG` takes precedence over the configured log level.

use anyhow::Context;
use citypulse::api::{serve, AppState};
use citypulse::auth::SessionManager;
use citypulse::config::{generate_default_config, Config, LoggingConfig};
use citypulse::osm::OsmClient;
use citypulse::store::{open_backend, RecordStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "citypulse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CityPulse server: citizen reports, city alerts and live updates")]
struct Args {
    /// Config file (default: standard locations, then environment only)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting CityPulse v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        backend = %config.store.backend,
        data_dir = %config.store.data_dir,
        "Store configuration"
    );

    let backend = open_backend(
        config.store.backend,
        &config.store.data_path(),
        config.store.quota_bytes,
    )
    .context("failed to open storage backend")?;

    let store = Arc::new(RecordStore::with_options(
        Arc::clone(&backend),
        config.store.store_options(),
    ));
    let relay = store.start_change_relay(config.store.watch_interval());

    let sessions = Arc::new(SessionManager::new(backend));

    let osm_config = config.osm.to_osm_config();
    if osm_config.mappls_key.is_none() {
        tracing::info!("MAPPLS_MAP_KEY not set, serving mock map tokens");
    }
    let city_data =
        Arc::new(OsmClient::new(osm_config.clone()).context("failed to build OSM client")?);

    let api_config = config.api.to_server_config();
    let state = AppState::new(
        Arc::clone(&store),
        sessions,
        city_data,
        osm_config,
        api_config.clone(),
    );

    tracing::info!("Store: {}", store.stats());
    serve(state, &api_config).await?;

    relay.abort();
    tracing::info!("CityPulse stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "citypulse={level},tower_http={level}",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
