//! Hourly collection loop. One cron job pinned to the market's timezone
//! fetches generation, prices, consumption and weather; generation is the
//! backbone and aborts the run when it fails, the other sources only warn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono_tz::Tz;
use time::macros::offset;
use time::{Duration, OffsetDateTime};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use market_client::epias::timestamp_param;

use crate::sources::{MarketSource, WeatherSource};
use crate::store::{CollectionStatus, EnergyStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub next_run: Option<String>,
}

pub struct CollectionScheduler {
    inner: JobScheduler,
    job_id: Uuid,
    timezone: Tz,
    running: Arc<AtomicBool>,
    store: EnergyStore,
    market: Arc<dyn MarketSource>,
}

impl CollectionScheduler {
    /// Registers the hourly job. The job fires on `cron` (six fields, with
    /// seconds) in `timezone`; fires are dropped while stopped or while a
    /// previous run is still in flight.
    pub async fn install(
        cron: &str,
        timezone: &str,
        store: EnergyStore,
        market: Arc<dyn MarketSource>,
        weather: Arc<dyn WeatherSource>,
    ) -> anyhow::Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("bad timezone {timezone:?}: {e}"))?;

        let inner = JobScheduler::new().await?;
        let running = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicBool::new(false));

        let job = {
            let store = store.clone();
            let market = Arc::clone(&market);
            let running = Arc::clone(&running);
            Job::new_async_tz(cron, timezone, move |_id, _sched| {
                let store = store.clone();
                let market = Arc::clone(&market);
                let weather = Arc::clone(&weather);
                let running = Arc::clone(&running);
                let in_flight = Arc::clone(&in_flight);
                Box::pin(async move {
                    if !running.load(Ordering::SeqCst) {
                        debug!("collector stopped, dropping scheduled fire");
                        return;
                    }
                    if in_flight.swap(true, Ordering::SeqCst) {
                        warn!("previous collection still in flight, dropping fire");
                        return;
                    }
                    match collect_once(&store, market.as_ref(), weather.as_ref()).await {
                        Ok(outcome) => info!(
                            inserted = outcome.inserted,
                            updated = outcome.updated,
                            elapsed_ms = outcome.execution_time_ms,
                            "scheduled collection finished"
                        ),
                        Err(e) => error!(error = %e, "scheduled collection failed"),
                    }
                    in_flight.store(false, Ordering::SeqCst);
                })
            })
            .context("invalid cron expression")?
        };

        let job_id = inner.add(job).await?;
        inner.start().await?;

        Ok(Self {
            inner,
            job_id,
            timezone,
            running,
            store,
            market,
        })
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("collection scheduler started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("collection scheduler stopped");
    }

    pub async fn status(&self) -> SchedulerStatus {
        // next_tick_for_job takes &mut; the scheduler handle is cheap to clone.
        let next_run = self
            .inner
            .clone()
            .next_tick_for_job(self.job_id)
            .await
            .ok()
            .flatten()
            .map(|tick| tick.with_timezone(&self.timezone).to_rfc3339());

        SchedulerStatus {
            is_running: self.running.load(Ordering::SeqCst),
            next_run,
        }
    }

    /// On-demand generation fetch, independent of the cron cadence.
    pub async fn trigger_manual(&self) -> anyhow::Result<CollectionOutcome> {
        trigger_manual_collection(&self.store, self.market.as_ref()).await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.inner.clone().shutdown().await?;
        Ok(())
    }
}

/// One scheduled collection pass. Generation drives the outcome: its failure
/// aborts the run and is logged as an error. Prices, consumption and weather
/// are best-effort; their failures are warned about and the pass continues.
/// The audit row carries generation's counts and the whole pass's elapsed
/// time.
pub async fn collect_once(
    store: &EnergyStore,
    market: &dyn MarketSource,
    weather: &dyn WeatherSource,
) -> anyhow::Result<CollectionOutcome> {
    let started = Instant::now();

    let outcome = match collect_generation(store, market).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let elapsed = started.elapsed().as_millis() as u64;
            audit(store, CollectionStatus::Error, 0, 0, Some(&e.to_string()), elapsed).await;
            return Err(e);
        }
    };

    let today = OffsetDateTime::now_utc().to_offset(offset!(+3)).date();
    let yesterday = today - Duration::days(1);
    let start = timestamp_param(yesterday);
    let end = timestamp_param(today);

    match market.price(&start, &end).await {
        Ok(records) => match store.save_price_data(&records).await {
            Ok(saved) => debug!(fetched = records.len(), saved = saved.total(), "prices collected"),
            Err(e) => warn!(error = %e, "price save failed, continuing"),
        },
        Err(e) => warn!(error = %e, "price fetch failed, continuing"),
    }

    match market.consumption(&start, &end).await {
        Ok(records) => match store.save_consumption_data(&records).await {
            Ok(saved) => debug!(
                fetched = records.len(),
                saved = saved.total(),
                "consumption collected"
            ),
            Err(e) => warn!(error = %e, "consumption save failed, continuing"),
        },
        Err(e) => warn!(error = %e, "consumption fetch failed, continuing"),
    }

    match weather.current_weather().await {
        Ok(records) => match store.save_weather_data(&records).await {
            Ok(saved) => debug!(fetched = records.len(), saved = saved.total(), "weather collected"),
            Err(e) => warn!(error = %e, "weather save failed, continuing"),
        },
        Err(e) => warn!(error = %e, "weather fetch failed, continuing"),
    }

    let elapsed = started.elapsed().as_millis() as u64;
    audit(
        store,
        CollectionStatus::Success,
        outcome.inserted,
        outcome.updated,
        None,
        elapsed,
    )
    .await;

    metrics::counter!("collection_runs_total").increment(1);
    metrics::counter!("collection_records_inserted_total").increment(outcome.inserted);
    metrics::histogram!("collection_duration_ms").record(elapsed as f64);

    Ok(CollectionOutcome {
        inserted: outcome.inserted,
        updated: outcome.updated,
        execution_time_ms: elapsed,
    })
}

/// On-demand collection: generation only, no secondary sources.
pub async fn trigger_manual_collection(
    store: &EnergyStore,
    market: &dyn MarketSource,
) -> anyhow::Result<CollectionOutcome> {
    let started = Instant::now();

    match collect_generation(store, market).await {
        Ok(outcome) => {
            let elapsed = started.elapsed().as_millis() as u64;
            audit(
                store,
                CollectionStatus::ManualSuccess,
                outcome.inserted,
                outcome.updated,
                None,
                elapsed,
            )
            .await;
            Ok(CollectionOutcome {
                inserted: outcome.inserted,
                updated: outcome.updated,
                execution_time_ms: elapsed,
            })
        }
        Err(e) => {
            let elapsed = started.elapsed().as_millis() as u64;
            audit(
                store,
                CollectionStatus::ManualError,
                0,
                0,
                Some(&e.to_string()),
                elapsed,
            )
            .await;
            Err(e)
        }
    }
}

async fn collect_generation(
    store: &EnergyStore,
    market: &dyn MarketSource,
) -> anyhow::Result<crate::store::SaveOutcome> {
    let records = market
        .realtime_generation()
        .await
        .context("generation fetch failed")?;
    let outcome = store
        .save_energy_data(&records)
        .await
        .context("generation save failed")?;
    info!(
        fetched = records.len(),
        inserted = outcome.inserted,
        updated = outcome.updated,
        "generation collected"
    );
    Ok(outcome)
}

/// Audit logging must never change the pass's outcome.
async fn audit(
    store: &EnergyStore,
    status: CollectionStatus,
    inserted: u64,
    updated: u64,
    error_message: Option<&str>,
    execution_time_ms: u64,
) {
    if let Err(e) = store
        .log_collection(status, inserted, updated, error_message, execution_time_ms)
        .await
    {
        warn!(error = %e, "failed to write collection log");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use market_client::domain::{
        ConsumptionRecord, GenerationRecord, PriceRecord, WeatherRecord,
    };
    use market_client::error::{DataKind, MarketError, WeatherError};

    use super::*;
    use crate::sources::{MarketSource, WeatherSource};

    #[derive(Default)]
    struct ScriptedMarket {
        fail_generation: bool,
        fail_price: bool,
        fail_consumption: bool,
    }

    fn fetch_err(kind: DataKind) -> MarketError {
        MarketError::Fetch {
            kind,
            range: None,
            message: "status 500".to_string(),
        }
    }

    #[async_trait]
    impl MarketSource for ScriptedMarket {
        async fn realtime_generation(&self) -> Result<Vec<GenerationRecord>, MarketError> {
            if self.fail_generation {
                return Err(fetch_err(DataKind::RealtimeGeneration));
            }
            Ok(vec![GenerationRecord {
                date: "2024-10-12".to_string(),
                hour: "13:00".to_string(),
                total: 40_000.0,
                ..Default::default()
            }])
        }

        async fn historical_generation(
            &self,
            _start: &str,
            _end: &str,
        ) -> Result<Vec<GenerationRecord>, MarketError> {
            Ok(vec![])
        }

        async fn price(&self, _start: &str, _end: &str) -> Result<Vec<PriceRecord>, MarketError> {
            if self.fail_price {
                return Err(fetch_err(DataKind::Price));
            }
            Ok(vec![PriceRecord {
                date: "2024-10-12".to_string(),
                hour: "13:00".to_string(),
                price: 2450.75,
                ..Default::default()
            }])
        }

        async fn consumption(
            &self,
            _start: &str,
            _end: &str,
        ) -> Result<Vec<ConsumptionRecord>, MarketError> {
            if self.fail_consumption {
                return Err(fetch_err(DataKind::Consumption));
            }
            Ok(vec![ConsumptionRecord {
                date: "2024-10-12".to_string(),
                hour: "13:00".to_string(),
                consumption: 31_450.2,
            }])
        }
    }

    struct ScriptedWeather {
        fail: bool,
    }

    #[async_trait]
    impl WeatherSource for ScriptedWeather {
        async fn current_weather(&self) -> Result<Vec<WeatherRecord>, WeatherError> {
            if self.fail {
                return Err(WeatherError::Fetch("status 502".to_string()));
            }
            Ok(vec![WeatherRecord {
                date: "2024-10-12".to_string(),
                hour: "13:00".to_string(),
                city: "Istanbul".to_string(),
                temperature: 18.5,
                ..Default::default()
            }])
        }

        async fn historical_weather(
            &self,
            _start: &str,
            _end: &str,
        ) -> Result<Vec<WeatherRecord>, WeatherError> {
            Ok(vec![])
        }
    }

    async fn store() -> EnergyStore {
        let store = EnergyStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    #[tokio::test]
    async fn generation_failure_aborts_and_logs_error() {
        let store = store().await;
        let market = ScriptedMarket {
            fail_generation: true,
            ..Default::default()
        };
        let weather = ScriptedWeather { fail: false };

        let result = collect_once(&store, &market, &weather).await;
        assert!(result.is_err());

        let logs = store.collection_logs(5).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "error");
        assert_eq!(logs[0].records_inserted, 0);
        assert_eq!(logs[0].records_updated, 0);
        assert!(logs[0].error_message.as_deref().unwrap().contains("500"));

        // Nothing past generation ran.
        assert!(store.recent_price_data(5).await.unwrap().is_empty());
        assert!(store.recent_consumption_data(5).await.unwrap().is_empty());
        assert!(store.recent_weather_data(5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn secondary_source_failures_do_not_fail_the_run() {
        let store = store().await;
        let market = ScriptedMarket {
            fail_price: true,
            fail_consumption: false,
            ..Default::default()
        };
        let weather = ScriptedWeather { fail: true };

        let outcome = collect_once(&store, &market, &weather).await.unwrap();
        assert_eq!(outcome.inserted, 1);

        let logs = store.collection_logs(5).await.unwrap();
        assert_eq!(logs[0].status, "success");
        assert_eq!(logs[0].records_inserted, 1);
        assert!(logs[0].error_message.is_none());

        // Consumption still ran after the price failure.
        assert_eq!(store.recent_consumption_data(5).await.unwrap().len(), 1);
        assert!(store.recent_price_data(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_run_collects_all_four_sources() {
        let store = store().await;
        let market = ScriptedMarket::default();
        let weather = ScriptedWeather { fail: false };

        collect_once(&store, &market, &weather).await.unwrap();

        assert_eq!(store.recent_energy_data(5).await.unwrap().len(), 1);
        assert_eq!(store.recent_price_data(5).await.unwrap().len(), 1);
        assert_eq!(store.recent_consumption_data(5).await.unwrap().len(), 1);
        assert_eq!(store.recent_weather_data(5, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn manual_trigger_is_generation_only() {
        let store = store().await;
        let market = ScriptedMarket::default();

        let outcome = trigger_manual_collection(&store, &market).await.unwrap();
        assert_eq!(outcome.inserted, 1);

        let logs = store.collection_logs(5).await.unwrap();
        assert_eq!(logs[0].status, "manual_success");

        // Secondary sources are not part of a manual run.
        assert!(store.recent_price_data(5).await.unwrap().is_empty());
        assert!(store.recent_weather_data(5, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_trigger_failure_is_tagged() {
        let store = store().await;
        let market = ScriptedMarket {
            fail_generation: true,
            ..Default::default()
        };

        assert!(trigger_manual_collection(&store, &market).await.is_err());

        let logs = store.collection_logs(5).await.unwrap();
        assert_eq!(logs[0].status, "manual_error");
        assert!(logs[0].error_message.is_some());
    }
}
