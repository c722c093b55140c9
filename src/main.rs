use std::sync::Arc;

use chairside::{
    api::{self, AppState},
    config::{database, server, shop},
    core::{notify::LogNotifier, reminder::spawn_reminder_task, settings::seed_settings},
    errors::Result,
};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the shop seed configuration
    let config_path = server::config_path();
    let config = shop::load_or_default(&config_path)
        .inspect_err(|e| error!("Failed to load {}: {}", config_path, e))?;

    // 4. Connect and create the schema
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed shop settings on first start
    seed_settings(&db, &config.shop)
        .await
        .inspect_err(|e| error!("Failed to seed shop settings: {}", e))?;

    // 6. Background reminder sweep
    spawn_reminder_task(db.clone(), Arc::new(LogNotifier), config.reminders);

    // 7. Serve the API
    let addr = server::bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", addr, e))?;
    info!("Listening on {}", addr);

    axum::serve(listener, api::app(AppState::new(db)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
