use serde::Serialize;
use sqlx::FromRow;

use super::{EnergyStore, StoreError};

/// An hour-of-day label with its average generation across all stored days.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PeakHour {
    pub hour: String,
    pub avg_total: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceAverages {
    pub natural_gas: f64,
    pub wind: f64,
    pub sun: f64,
    pub dammed_hydro: f64,
    pub import_coal: f64,
    pub lignite: f64,
    pub total: f64,
}

/// Summary over stored generation. `total_records`, `date_range` and
/// `peak_hours` describe the whole table; the averages, extremes and the
/// renewable share only look at the most recent `hours` rows, using the same
/// row-count limit the recent-data readers use.
#[derive(Debug, Clone, Serialize)]
pub struct EnergyStats {
    pub total_records: i64,
    pub date_range: Option<(String, String)>,
    pub avg_total: f64,
    pub max_total: f64,
    pub min_total: f64,
    pub renewable_pct: f64,
    pub source_averages: SourceAverages,
    pub peak_hours: Vec<PeakHour>,
}

#[derive(Debug, FromRow)]
struct WindowAggRow {
    avg_total: f64,
    max_total: f64,
    min_total: f64,
    avg_natural_gas: f64,
    avg_wind: f64,
    avg_sun: f64,
    avg_dammed_hydro: f64,
    avg_import_coal: f64,
    avg_lignite: f64,
    avg_river: f64,
    avg_geothermal: f64,
}

impl EnergyStore {
    pub async fn energy_stats(&self, hours: i64) -> Result<EnergyStats, StoreError> {
        let (total_records,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM energy_data")
            .fetch_one(self.pool())
            .await?;

        let range: (Option<String>, Option<String>) =
            sqlx::query_as("SELECT MIN(date), MAX(date) FROM energy_data")
                .fetch_one(self.pool())
                .await?;
        let date_range = match range {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        };

        let agg = sqlx::query_as::<_, WindowAggRow>(
            "SELECT
                 COALESCE(AVG(total), 0.0)        AS avg_total,
                 COALESCE(MAX(total), 0.0)        AS max_total,
                 COALESCE(MIN(total), 0.0)        AS min_total,
                 COALESCE(AVG(natural_gas), 0.0)  AS avg_natural_gas,
                 COALESCE(AVG(wind), 0.0)         AS avg_wind,
                 COALESCE(AVG(sun), 0.0)          AS avg_sun,
                 COALESCE(AVG(dammed_hydro), 0.0) AS avg_dammed_hydro,
                 COALESCE(AVG(import_coal), 0.0)  AS avg_import_coal,
                 COALESCE(AVG(lignite), 0.0)      AS avg_lignite,
                 COALESCE(AVG(river), 0.0)        AS avg_river,
                 COALESCE(AVG(geothermal), 0.0)   AS avg_geothermal
             FROM (
                 SELECT * FROM energy_data
                 ORDER BY date DESC, hour DESC
                 LIMIT ?
             )",
        )
        .bind(hours)
        .fetch_one(self.pool())
        .await?;

        let renewable = agg.avg_wind
            + agg.avg_sun
            + agg.avg_dammed_hydro
            + agg.avg_river
            + agg.avg_geothermal;
        let renewable_pct = if agg.avg_total > 0.0 {
            renewable / agg.avg_total * 100.0
        } else {
            0.0
        };

        // Hour-of-day profile over everything stored, not just the window.
        let peak_hours = sqlx::query_as::<_, PeakHour>(
            "SELECT hour, AVG(total) AS avg_total
             FROM energy_data
             GROUP BY hour
             ORDER BY avg_total DESC
             LIMIT 3",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(EnergyStats {
            total_records,
            date_range,
            avg_total: agg.avg_total,
            max_total: agg.max_total,
            min_total: agg.min_total,
            renewable_pct,
            source_averages: SourceAverages {
                natural_gas: agg.avg_natural_gas,
                wind: agg.avg_wind,
                sun: agg.avg_sun,
                dammed_hydro: agg.avg_dammed_hydro,
                import_coal: agg.avg_import_coal,
                lignite: agg.avg_lignite,
                total: agg.avg_total,
            },
            peak_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use market_client::domain::GenerationRecord;

    use super::*;

    async fn store() -> EnergyStore {
        let store = EnergyStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    fn record(date: &str, hour: &str, total: f64) -> GenerationRecord {
        GenerationRecord {
            date: date.to_string(),
            hour: hour.to_string(),
            total,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_table_yields_zeroed_stats() {
        let store = store().await;
        let stats = store.energy_stats(24).await.unwrap();
        assert_eq!(stats.total_records, 0);
        assert!(stats.date_range.is_none());
        assert_eq!(stats.avg_total, 0.0);
        assert_eq!(stats.max_total, 0.0);
        assert_eq!(stats.min_total, 0.0);
        assert_eq!(stats.renewable_pct, 0.0);
        assert_eq!(stats.source_averages.natural_gas, 0.0);
        assert_eq!(stats.source_averages.total, 0.0);
        assert!(stats.peak_hours.is_empty());
    }

    #[tokio::test]
    async fn zero_totals_do_not_divide_by_zero() {
        let store = store().await;
        store
            .save_energy_data(&[
                record("2024-10-12", "00:00", 0.0),
                record("2024-10-12", "01:00", 0.0),
            ])
            .await
            .unwrap();

        let stats = store.energy_stats(24).await.unwrap();
        assert_eq!(stats.renewable_pct, 0.0);
    }

    #[tokio::test]
    async fn window_excludes_older_rows_but_totals_do_not() {
        let store = store().await;

        // One old row far outside any window, plus two recent ones.
        let mut old = record("2024-01-01", "00:00", 90_000.0);
        old.natural_gas = 90_000.0;
        let mut recent_a = record("2024-10-12", "13:00", 40_000.0);
        recent_a.wind = 10_000.0;
        recent_a.sun = 10_000.0;
        let mut recent_b = record("2024-10-12", "14:00", 20_000.0);
        recent_b.dammed_hydro = 5_000.0;
        store
            .save_energy_data(&[old, recent_a, recent_b])
            .await
            .unwrap();

        let stats = store.energy_stats(2).await.unwrap();

        // Whole-table facts.
        assert_eq!(stats.total_records, 3);
        assert_eq!(
            stats.date_range,
            Some(("2024-01-01".to_string(), "2024-10-12".to_string()))
        );

        // Windowed facts only see the two recent rows.
        assert_eq!(stats.avg_total, 30_000.0);
        assert_eq!(stats.max_total, 40_000.0);
        assert_eq!(stats.min_total, 20_000.0);
        // (avg wind 5000 + avg sun 5000 + avg hydro 2500) / avg total 30000
        let expected = (5_000.0 + 5_000.0 + 2_500.0) / 30_000.0 * 100.0;
        assert!((stats.renewable_pct - expected).abs() < 1e-9);
        assert_eq!(stats.source_averages.natural_gas, 0.0);
        assert_eq!(stats.source_averages.total, 30_000.0);
    }

    #[tokio::test]
    async fn peak_hours_group_by_hour_label_across_all_days() {
        let store = store().await;
        store
            .save_energy_data(&[
                record("2024-10-10", "09:00", 30_000.0),
                record("2024-10-11", "09:00", 50_000.0),
                record("2024-10-10", "18:00", 45_000.0),
                record("2024-10-11", "18:00", 45_000.0),
                record("2024-10-10", "03:00", 20_000.0),
                record("2024-10-11", "03:00", 20_000.0),
                record("2024-10-10", "12:00", 10_000.0),
            ])
            .await
            .unwrap();

        // Window of 1 must not affect the hour-of-day profile.
        let stats = store.energy_stats(1).await.unwrap();
        let labels: Vec<_> = stats.peak_hours.iter().map(|p| p.hour.as_str()).collect();
        assert_eq!(labels, vec!["18:00", "09:00", "03:00"]);
        assert_eq!(stats.peak_hours[0].avg_total, 45_000.0);
        assert_eq!(stats.peak_hours[1].avg_total, 40_000.0);
    }
}
