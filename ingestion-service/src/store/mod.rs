mod audit;
mod generation;
mod market;
mod migrations;
mod staging;
mod stats;
mod weather;

pub use audit::{BackfillProgressRow, BackfillStatus, CollectionLogRow, CollectionStatus};
pub use stats::{EnergyStats, PeakHour, SourceAverages};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration {id} failed: {source}")]
    Migration { id: String, source: sqlx::Error },
}

/// Outcome of a batch write, split into rows that were new and rows that
/// replaced an existing (date, hour) entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub inserted: u64,
    pub updated: u64,
}

impl SaveOutcome {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated
    }
}

#[derive(Clone)]
pub struct EnergyStore {
    pool: SqlitePool,
}

impl EnergyStore {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection with no idle reaping
    /// keeps the database alive for the store's lifetime.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
