use std::sync::Arc;

use anyhow::Context;

use pdm_tickets::{api, config::AppConfig, db, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let _log_guard = logging::init_logging(&config.data_dir)?;

    tracing::info!("PDM tickets starting up...");
    tracing::info!("Data directory: {:?}", config.data_dir);

    let database = Arc::new(
        db::Database::open(config.db_path()).context("Failed to open database")?,
    );

    let handle = api::start_server(database, config.api.clone()).await?;
    tracing::info!("API server started at {}", handle.addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutdown requested");
    handle.shutdown().await;
    Ok(())
}
