//! Conductor Backend
//!
//! Course enrollment service: accounts, bearer tokens, professor-owned
//! courses and student enrollments.

use conductor_backend::{api, core, db};

use anyhow::Result;
use conductor_backend::db::repository::UserRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (handles CLI args, env vars, and config file)
    let config = match core::config::Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't initialized yet
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let _logger = match core::Logger::init(&config.logging) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return Err(e);
        }
    };

    info!("Starting Conductor Backend v{}", conductor_backend::VERSION);
    info!(
        host = %config.server.host,
        port = config.server.port,
        environment = %config.app.environment,
        "Server configuration"
    );
    if config.app.is_dev() {
        tracing::warn!("Development routes under /dev are enabled");
    }

    info!("Initializing database...");
    let db = Arc::new(db::DatabaseManager::new(
        &config.database.path,
        config.database.connection_pool_size as u32,
        Duration::from_millis(config.database.busy_timeout),
    )?);
    let accounts = UserRepository::new(db.clone()).count().await?;
    info!(
        path = %db.db_path().display(),
        pool_size = db.pool_size(),
        accounts,
        "Database initialized successfully"
    );

    info!("Initializing HTTP server...");
    let server_url = format!("http://{}:{}", config.server.host, config.server.port);
    let server = api::ApiServer::new(config, db).await?;

    info!(url = %server_url, "Server ready - starting to serve requests");

    // Blocks until a shutdown signal arrives
    server.serve().await?;

    Ok(())
}
