//! Chunked historical backfill. A runner walks an inclusive date range in
//! fixed-size chunks, records progress after every chunk, and keeps going
//! past individual chunk failures; only cancellation marks the run failed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::macros::offset;
use time::{Date, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use market_client::epias::{day_param, timestamp_param};

use crate::config::BackfillConfig;
use crate::sources::{MarketSource, WeatherSource};
use crate::store::{BackfillStatus, EnergyStore};

#[derive(Debug, Clone)]
pub struct BackfillPlan {
    pub span_days: i64,
    pub chunk_days: i64,
    pub chunk_delay: Duration,
}

impl BackfillPlan {
    pub fn generation(cfg: &BackfillConfig) -> Self {
        Self {
            span_days: cfg.generation_span_days,
            chunk_days: cfg.generation_chunk_days,
            chunk_delay: Duration::from_millis(cfg.chunk_delay_ms),
        }
    }

    pub fn generation_history(cfg: &BackfillConfig) -> Self {
        Self {
            span_days: cfg.generation_history_span_days,
            chunk_days: cfg.generation_history_chunk_days,
            chunk_delay: Duration::from_millis(cfg.market_chunk_delay_ms),
        }
    }

    pub fn market(cfg: &BackfillConfig) -> Self {
        Self {
            span_days: cfg.market_span_days,
            chunk_days: cfg.market_chunk_days,
            chunk_delay: Duration::from_millis(cfg.market_chunk_delay_ms),
        }
    }

    pub fn weather(cfg: &BackfillConfig) -> Self {
        Self {
            span_days: cfg.weather_span_days,
            chunk_days: cfg.weather_chunk_days,
            chunk_delay: Duration::from_millis(cfg.chunk_delay_ms),
        }
    }
}

/// One backfillable upstream. `run_chunk` fetches and persists an inclusive
/// date range and reports how many rows it wrote.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    fn label(&self) -> &'static str;

    /// Rows a fully populated day contributes, for completeness accounting.
    fn expected_rows_per_day(&self) -> u64 {
        24
    }

    async fn run_chunk(
        &self,
        store: &EnergyStore,
        start: Date,
        end: Date,
    ) -> anyhow::Result<u64>;
}

#[derive(Debug, Clone)]
pub struct BackfillReport {
    pub progress_id: i64,
    pub status: BackfillStatus,
    pub records: u64,
    pub days: i64,
    pub chunks_attempted: u32,
    pub chunks_failed: u32,
    pub completeness_pct: f64,
}

pub struct BackfillRunner<'a> {
    store: &'a EnergyStore,
    plan: BackfillPlan,
}

impl<'a> BackfillRunner<'a> {
    pub fn new(store: &'a EnergyStore, plan: BackfillPlan) -> Self {
        Self { store, plan }
    }

    /// Backfills the plan's span ending today (market local time).
    pub async fn run(
        &self,
        source: &dyn ChunkSource,
        cancel: &CancellationToken,
    ) -> anyhow::Result<BackfillReport> {
        let today = OffsetDateTime::now_utc().to_offset(offset!(+3)).date();
        let start = today - time::Duration::days(self.plan.span_days);
        self.run_range(source, cancel, start, today).await
    }

    /// Walks `[start, end]` in `chunk_days` chunks. A failed chunk is noted
    /// in the progress row and the walk continues; the run only ends early
    /// on cancellation, which marks it failed.
    pub async fn run_range(
        &self,
        source: &dyn ChunkSource,
        cancel: &CancellationToken,
        start: Date,
        end: Date,
    ) -> anyhow::Result<BackfillReport> {
        // A misconfigured chunk size must not stall the walk.
        let chunk_days = self.plan.chunk_days.max(1);
        let days = (end - start).whole_days() + 1;

        let progress_id = self
            .store
            .create_backfill_progress(source.label(), &day_param(start), &day_param(end))
            .await?;
        info!(
            source = source.label(),
            start = %day_param(start),
            end = %day_param(end),
            progress_id,
            "backfill started"
        );

        let mut records: u64 = 0;
        let mut chunk_index: u32 = 0;
        let mut chunks_failed: u32 = 0;
        let mut chunk_start = start;

        while chunk_start <= end {
            if cancel.is_cancelled() {
                let message = format!("cancelled after {chunk_index} chunks");
                self.store
                    .complete_backfill_progress(progress_id, BackfillStatus::Failed, Some(&message))
                    .await?;
                warn!(source = source.label(), progress_id, "backfill cancelled");
                return Ok(BackfillReport {
                    progress_id,
                    status: BackfillStatus::Failed,
                    records,
                    days,
                    chunks_attempted: chunk_index,
                    chunks_failed,
                    completeness_pct: completeness(records, days, source.expected_rows_per_day()),
                });
            }

            let chunk_end = (chunk_start + time::Duration::days(chunk_days - 1)).min(end);
            chunk_index += 1;

            match source.run_chunk(self.store, chunk_start, chunk_end).await {
                Ok(written) => {
                    records += written;
                    self.store
                        .update_backfill_progress(
                            progress_id,
                            Some(&day_param(chunk_end)),
                            records,
                            None,
                        )
                        .await?;
                    info!(
                        source = source.label(),
                        chunk = chunk_index,
                        start = %day_param(chunk_start),
                        end = %day_param(chunk_end),
                        written,
                        "chunk done"
                    );
                }
                Err(e) => {
                    chunks_failed += 1;
                    let message = format!(
                        "chunk {chunk_index} ({} to {}) failed: {e}",
                        day_param(chunk_start),
                        day_param(chunk_end)
                    );
                    self.store
                        .update_backfill_progress(progress_id, None, records, Some(&message))
                        .await?;
                    warn!(source = source.label(), chunk = chunk_index, error = %e, "chunk failed, continuing");
                }
            }

            chunk_start = chunk_end + time::Duration::days(1);
            if chunk_start <= end && !self.plan.chunk_delay.is_zero() {
                tokio::time::sleep(self.plan.chunk_delay).await;
            }
        }

        self.store
            .complete_backfill_progress(progress_id, BackfillStatus::Completed, None)
            .await?;

        let completeness_pct = completeness(records, days, source.expected_rows_per_day());
        if completeness_pct < 90.0 {
            warn!(
                source = source.label(),
                completeness_pct, "backfill finished with gaps"
            );
        }
        info!(
            source = source.label(),
            records, chunks_failed, completeness_pct, "backfill finished"
        );

        Ok(BackfillReport {
            progress_id,
            status: BackfillStatus::Completed,
            records,
            days,
            chunks_attempted: chunk_index,
            chunks_failed,
            completeness_pct,
        })
    }
}

/// Records over expected rows for the whole range.
fn completeness(records: u64, days: i64, per_day: u64) -> f64 {
    let expected = days * per_day as i64;
    if expected <= 0 {
        return 0.0;
    }
    records as f64 / expected as f64 * 100.0
}

/// Historical generation into the staging table, where rows wait for a
/// quality review before promotion.
pub struct GenerationChunks {
    pub client: Arc<dyn MarketSource>,
}

#[async_trait]
impl ChunkSource for GenerationChunks {
    fn label(&self) -> &'static str {
        "generation"
    }

    async fn run_chunk(
        &self,
        store: &EnergyStore,
        start: Date,
        end: Date,
    ) -> anyhow::Result<u64> {
        let records = self
            .client
            .historical_generation(&day_param(start), &day_param(end))
            .await?;
        let outcome = store.save_staging_data(&records).await?;
        Ok(outcome.total())
    }
}

/// Historical generation straight into the live table, for seeding a fresh
/// database with history the dashboard can read immediately.
pub struct GenerationHistoryChunks {
    pub client: Arc<dyn MarketSource>,
}

#[async_trait]
impl ChunkSource for GenerationHistoryChunks {
    fn label(&self) -> &'static str {
        "generation_history"
    }

    async fn run_chunk(
        &self,
        store: &EnergyStore,
        start: Date,
        end: Date,
    ) -> anyhow::Result<u64> {
        let records = self
            .client
            .historical_generation(&day_param(start), &day_param(end))
            .await?;
        let outcome = store.save_energy_data(&records).await?;
        Ok(outcome.total())
    }
}

/// Prices and consumption share a chunk with a pause between the two calls.
/// One of the pair failing is tolerated; both failing fails the chunk. Row
/// counts are kept per feed so each one's completeness can be judged on its
/// own.
pub struct MarketChunks {
    client: Arc<dyn MarketSource>,
    pause: Duration,
    price_rows: AtomicU64,
    consumption_rows: AtomicU64,
}

impl MarketChunks {
    pub fn new(client: Arc<dyn MarketSource>, pause: Duration) -> Self {
        Self {
            client,
            pause,
            price_rows: AtomicU64::new(0),
            consumption_rows: AtomicU64::new(0),
        }
    }

    pub fn feed_totals(&self) -> (u64, u64) {
        (
            self.price_rows.load(Ordering::Relaxed),
            self.consumption_rows.load(Ordering::Relaxed),
        )
    }

    /// Per-feed completeness against `days * 24` expected rows each.
    pub fn feed_completeness(&self, days: i64) -> (f64, f64) {
        let (price, consumption) = self.feed_totals();
        (
            completeness(price, days, 24),
            completeness(consumption, days, 24),
        )
    }
}

#[async_trait]
impl ChunkSource for MarketChunks {
    fn label(&self) -> &'static str {
        "market"
    }

    // Each day contributes a price row and a consumption row per hour.
    fn expected_rows_per_day(&self) -> u64 {
        48
    }

    async fn run_chunk(
        &self,
        store: &EnergyStore,
        start: Date,
        end: Date,
    ) -> anyhow::Result<u64> {
        let from = timestamp_param(start);
        let to = timestamp_param(end);
        let mut written: u64 = 0;

        let price_result = match self.client.price(&from, &to).await {
            Ok(records) => {
                let saved = store.save_price_data(&records).await?.total();
                self.price_rows.fetch_add(saved, Ordering::Relaxed);
                written += saved;
                Ok(())
            }
            Err(e) => Err(e),
        };

        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }

        let consumption_result = match self.client.consumption(&from, &to).await {
            Ok(records) => {
                let saved = store.save_consumption_data(&records).await?.total();
                self.consumption_rows.fetch_add(saved, Ordering::Relaxed);
                written += saved;
                Ok(())
            }
            Err(e) => Err(e),
        };

        match (price_result, consumption_result) {
            (Err(p), Err(c)) => Err(anyhow::anyhow!("price: {p}; consumption: {c}")),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => {
                warn!(error = %e, "one market endpoint failed in chunk, keeping the other");
                Ok(written)
            }
            (Ok(()), Ok(())) => Ok(written),
        }
    }
}

pub struct WeatherChunks {
    pub client: Arc<dyn WeatherSource>,
}

#[async_trait]
impl ChunkSource for WeatherChunks {
    fn label(&self) -> &'static str {
        "weather"
    }

    async fn run_chunk(
        &self,
        store: &EnergyStore,
        start: Date,
        end: Date,
    ) -> anyhow::Result<u64> {
        let records = self
            .client
            .historical_weather(&day_param(start), &day_param(end))
            .await?;
        let outcome = store.save_weather_data(&records).await?;
        Ok(outcome.total())
    }
}
