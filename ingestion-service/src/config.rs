use std::io::ErrorKind;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/energy.db".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Six-field cron expression (with seconds). The default fires at the top
    /// of every hour; the upstream publishes with a few hours of delay, so
    /// anything faster is wasted calls.
    pub cron: String,
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 * * * *".to_string(),
            timezone: "Europe/Istanbul".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Historical generation into staging: six months in 7-day chunks.
    pub generation_span_days: i64,
    pub generation_chunk_days: i64,
    /// Historical generation into the live table: one year in 30-day chunks.
    pub generation_history_span_days: i64,
    pub generation_history_chunk_days: i64,
    /// Prices + consumption: one year in 30-day chunks.
    pub market_span_days: i64,
    pub market_chunk_days: i64,
    /// Weather archive: one year in 30-day chunks.
    pub weather_span_days: i64,
    pub weather_chunk_days: i64,
    pub chunk_delay_ms: u64,
    pub market_chunk_delay_ms: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            generation_span_days: 183,
            generation_chunk_days: 7,
            generation_history_span_days: 365,
            generation_history_chunk_days: 30,
            market_span_days: 365,
            market_chunk_days: 30,
            weather_span_days: 365,
            weather_chunk_days: 30,
            chunk_delay_ms: 2_000,
            market_chunk_delay_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        let loc = market_client::weather::Location::default();
        Self {
            city: loc.city,
            latitude: loc.latitude,
            longitude: loc.longitude,
        }
    }
}

impl WeatherConfig {
    pub fn location(&self) -> market_client::weather::Location {
        market_client::weather::Location {
            city: self.city.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub backfill: BackfillConfig,
    pub weather: WeatherConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Loads the file named by `INGESTION_CONFIG` (default
    /// `ingestion-config.toml`). A missing default file falls back to the
    /// built-in defaults; an explicitly configured path must exist.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var("INGESTION_CONFIG").ok();
        let path = explicit
            .clone()
            .unwrap_or_else(|| "ingestion-config.toml".to_string());

        match fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
            }
            Err(e) if e.kind() == ErrorKind::NotFound && explicit.is_none() => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_collection_cadences() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scheduler.cron, "0 0 * * * *");
        assert_eq!(cfg.backfill.generation_chunk_days, 7);
        assert_eq!(cfg.backfill.generation_history_chunk_days, 30);
        assert_eq!(cfg.backfill.generation_history_span_days, 365);
        assert_eq!(cfg.backfill.market_chunk_days, 30);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [database]
            path = "/tmp/test.db"

            [metrics]
            bind_addr = "127.0.0.1:9187"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.database.path, "/tmp/test.db");
        assert_eq!(cfg.database.max_connections, 4);
        assert_eq!(cfg.scheduler.timezone, "Europe/Istanbul");
        assert_eq!(cfg.metrics.unwrap().bind_addr, "127.0.0.1:9187");
    }
}
