use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ingestion_service::backfill::{BackfillPlan, BackfillRunner, MarketChunks};
use ingestion_service::config::AppConfig;
use ingestion_service::{observability, EnergyStore};
use market_client::{Credentials, EpiasClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing();
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;
    let store = EnergyStore::connect(&config.database.path, config.database.max_connections)
        .await
        .context("opening database")?;
    store.run_migrations().await?;

    let client = EpiasClient::new(Credentials::from_env());
    let source = MarketChunks::new(Arc::new(client), Duration::from_secs(1));
    let plan = BackfillPlan::market(&config.backfill);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let report = BackfillRunner::new(&store, plan).run(&source, &cancel).await?;

    let (price_pct, consumption_pct) = source.feed_completeness(report.days);
    if price_pct < 90.0 {
        warn!(completeness_pct = price_pct, "price backfill has gaps");
    }
    if consumption_pct < 90.0 {
        warn!(completeness_pct = consumption_pct, "consumption backfill has gaps");
    }
    info!(
        status = report.status.as_str(),
        records = report.records,
        chunks_failed = report.chunks_failed,
        price_completeness_pct = price_pct,
        consumption_completeness_pct = consumption_pct,
        "market backfill done"
    );

    store.close().await;
    Ok(())
}
