use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ingestion_service::backfill::{BackfillPlan, BackfillRunner, GenerationChunks};
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
    let source = GenerationChunks {
        client: Arc::new(client),
    };
    let plan = BackfillPlan::generation(&config.backfill);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let report = BackfillRunner::new(&store, plan).run(&source, &cancel).await?;
    info!(
        status = report.status.as_str(),
        records = report.records,
        chunks_failed = report.chunks_failed,
        completeness_pct = report.completeness_pct,
        "generation backfill done"
    );

    store.close().await;
    Ok(())
}
