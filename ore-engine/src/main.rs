//! ore-engine - Owner Resolution Engine service
//!
//! Serves the engine over HTTP REST + SSE. Settings resolve in the usual order:
//! command line, environment, TOML file, compiled default.

use anyhow::{Context, Result};
use clap::Parser;
use ore_common::config::{self, TomlConfig};
use ore_common::events::EventBus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ore_engine::config::{resolve_api_key, EngineConfig};
use ore_engine::providers::{opencorporates, CorporateRegistry, OpenCorporatesClient, ProviderSet};
use ore_engine::{AppState, Engine};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";
const DEFAULT_REGISTRY_REQUESTS_PER_SECOND: u32 = 2;
const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "ore-engine", version, about = "Owner Resolution Engine")]
struct Args {
    /// Data root folder (database lives here)
    #[arg(long, env = "ORE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// HTTP bind address
    #[arg(long, env = "ORE_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// TOML config file (defaults to ~/.config/ore/ore-engine.toml)
    #[arg(long, env = "ORE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| config::default_config_path("ore-engine"));
    let toml_config = match &config_path {
        Some(path) => config::load_toml_config(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => TomlConfig::default(),
    };

    // RUST_LOG wins over the TOML level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting ore-engine (Owner Resolution Engine)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), Some(&toml_config));
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;

    let db_path = config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = ore_engine::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

    let mut providers = ProviderSet::default();
    let registry_key = resolve_api_key(&db_pool, &toml_config, opencorporates::PROVIDER_NAME).await?;
    if registry_key.is_none() {
        warn!("No OpenCorporates token; registry calls use the anonymous quota");
    }
    let registry_rps = toml_config
        .tuning
        .registry_requests_per_second
        .unwrap_or(DEFAULT_REGISTRY_REQUESTS_PER_SECOND);
    let registry = OpenCorporatesClient::new(registry_key, registry_rps)?;
    providers.corporate_registry = Some(Arc::new(registry) as Arc<dyn CorporateRegistry>);

    let engine_config = EngineConfig::from_toml(&toml_config);
    let engine = Arc::new(Engine::new(db_pool.clone(), providers, &engine_config, event_bus.clone()));

    let purged = engine.purge_stale_cache().await?;
    info!(purged, "Cache maintenance complete");

    let resumed = engine.resume_incomplete_jobs().await?;
    if resumed > 0 {
        info!(resumed, "Resumed incomplete bulk jobs");
    }

    let state = AppState::new(db_pool, event_bus, engine);
    let app = ore_engine::build_router(state);

    let bind_address = args
        .bind_address
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
