//! `boilerplated` — the boilerplate server binary.
//!
//! Usage:
//!   boilerplated -c <config-name-or-path> [--listen <addr>]
//!
//! The config name resolves to `/etc/boilerplate/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use boilerplate_core::Module;
use clap::Parser;
use tracing::info;

use config::ServerConfig;

/// Boilerplate server.
#[derive(Parser, Debug)]
#[command(name = "boilerplated", about = "Boilerplate server")]
struct Cli {
    /// Config name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    // Verify configuration is valid.
    bootstrap::verify_config(&server_config)?;

    // Initialize storage.
    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = boilerplate_core::ServiceConfig {
        data_dir: Some(data_dir),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    // Initialize embedded stores (shared by all modules).
    let kv: Arc<dyn boilerplate_kv::KVStore> = Arc::new(
        boilerplate_kv::RedbStore::open(&core_config.resolve_db_path())
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    let sql: Arc<dyn boilerplate_sql::SQLStore> = Arc::new(
        boilerplate_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    // Initialize modules.
    let auth_module = boilerplate_auth::AuthModule::new(
        Arc::clone(&sql),
        Arc::clone(&kv),
        server_config.auth_config(),
    )?;
    info!("Auth module initialized");

    // Bootstrap: ensure the default role and root account exist.
    bootstrap::seed_defaults(auth_module.service(), &server_config)?;

    // Start the login audit worker; it runs for the life of the process.
    let _audit_cancel = boilerplate_auth::service::audit::start(Arc::clone(auth_module.service()));

    // Build router.
    let module_routes = vec![(auth_module.name(), auth_module.routes())];
    let app = routes::build_router(module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("Boilerplate server listening on {}", cli.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
