use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use ingestion_service::config::AppConfig;
use ingestion_service::scheduler::CollectionScheduler;
use ingestion_service::sources::{MarketSource, WeatherSource};
use ingestion_service::{metrics_server, observability, EnergyStore};
use market_client::{Credentials, EpiasClient, OpenMeteoClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing();
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;
    info!(db = %config.database.path, cron = %config.scheduler.cron, "starting ingestion service");

    let store = EnergyStore::connect(&config.database.path, config.database.max_connections)
        .await
        .context("opening database")?;
    store.run_migrations().await.context("running migrations")?;

    if let Some(metrics) = &config.metrics {
        metrics_server::serve(&metrics.bind_addr)
            .await
            .context("starting metrics endpoint")?;
    }

    let credentials = Credentials::from_env();
    if credentials.is_none() {
        warn!("EPIAS_USERNAME/EPIAS_PASSWORD not set, market fetches will fail until provided");
    }
    let market: Arc<dyn MarketSource> = Arc::new(EpiasClient::new(credentials));
    let weather: Arc<dyn WeatherSource> =
        Arc::new(OpenMeteoClient::new(config.weather.location()));

    let scheduler = CollectionScheduler::install(
        &config.scheduler.cron,
        &config.scheduler.timezone,
        store.clone(),
        market,
        weather,
    )
    .await
    .context("installing collection schedule")?;
    scheduler.start();

    let status = scheduler.status().await;
    info!(
        next_run = status.next_run.as_deref().unwrap_or("unknown"),
        "collector scheduled"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    scheduler.stop();
    scheduler.shutdown().await?;
    store.close().await;
    Ok(())
}
