use market_client::domain::GenerationRecord;
use sqlx::Row;

use super::{EnergyStore, SaveOutcome, StoreError};

impl EnergyStore {
    /// Upserts a batch of hourly generation rows keyed on (date, hour) inside
    /// one transaction. Re-ingesting a window is safe: existing rows are
    /// overwritten with the fresher values.
    pub async fn save_energy_data(
        &self,
        records: &[GenerationRecord],
    ) -> Result<SaveOutcome, StoreError> {
        let mut outcome = SaveOutcome::default();
        let mut tx = self.pool().begin().await?;

        for record in records {
            let existing: i64 = sqlx::query(
                "SELECT COUNT(*) AS n FROM energy_data WHERE date = ? AND hour = ?",
            )
            .bind(&record.date)
            .bind(&record.hour)
            .fetch_one(&mut *tx)
            .await?
            .get("n");

            sqlx::query(
                r#"
                INSERT INTO energy_data (
                    date, hour, total, natural_gas, dammed_hydro, lignite, river,
                    import_coal, wind, sun, fuel_oil, geothermal, asphaltite_coal,
                    black_coal, biomass, naphta, lng, import_export, waste_heat
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(date, hour) DO UPDATE SET
                    total = excluded.total,
                    natural_gas = excluded.natural_gas,
                    dammed_hydro = excluded.dammed_hydro,
                    lignite = excluded.lignite,
                    river = excluded.river,
                    import_coal = excluded.import_coal,
                    wind = excluded.wind,
                    sun = excluded.sun,
                    fuel_oil = excluded.fuel_oil,
                    geothermal = excluded.geothermal,
                    asphaltite_coal = excluded.asphaltite_coal,
                    black_coal = excluded.black_coal,
                    biomass = excluded.biomass,
                    naphta = excluded.naphta,
                    lng = excluded.lng,
                    import_export = excluded.import_export,
                    waste_heat = excluded.waste_heat
                "#,
            )
            .bind(&record.date)
            .bind(&record.hour)
            .bind(record.total)
            .bind(record.natural_gas)
            .bind(record.dammed_hydro)
            .bind(record.lignite)
            .bind(record.river)
            .bind(record.import_coal)
            .bind(record.wind)
            .bind(record.sun)
            .bind(record.fuel_oil)
            .bind(record.geothermal)
            .bind(record.asphaltite_coal)
            .bind(record.black_coal)
            .bind(record.biomass)
            .bind(record.naphta)
            .bind(record.lng)
            .bind(record.import_export)
            .bind(record.waste_heat)
            .execute(&mut *tx)
            .await?;

            if existing > 0 {
                outcome.updated += 1;
            } else {
                outcome.inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }

    /// Most recent rows by row count, not by wall-clock window.
    pub async fn recent_energy_data(
        &self,
        limit: i64,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, GenerationRecord>(
            "SELECT date, hour, total, natural_gas, dammed_hydro, lignite, river,
                    import_coal, wind, sun, fuel_oil, geothermal, asphaltite_coal,
                    black_coal, biomass, naphta, lng, import_export, waste_heat
             FROM energy_data
             ORDER BY date DESC, hour DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn energy_data_by_date_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<GenerationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, GenerationRecord>(
            "SELECT date, hour, total, natural_gas, dammed_hydro, lignite, river,
                    import_coal, wind, sun, fuel_oil, geothermal, asphaltite_coal,
                    black_coal, biomass, naphta, lng, import_export, waste_heat
             FROM energy_data
             WHERE date BETWEEN ? AND ?
             ORDER BY date ASC, hour ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, hour: &str, total: f64) -> GenerationRecord {
        GenerationRecord {
            date: date.to_string(),
            hour: hour.to_string(),
            total,
            wind: total / 4.0,
            ..Default::default()
        }
    }

    async fn store() -> EnergyStore {
        let store = EnergyStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    #[tokio::test]
    async fn reingest_updates_instead_of_duplicating() {
        let store = store().await;

        let first = store
            .save_energy_data(&[record("2024-10-12", "13:00", 40_000.0)])
            .await
            .unwrap();
        assert_eq!(first, SaveOutcome { inserted: 1, updated: 0 });

        let second = store
            .save_energy_data(&[
                record("2024-10-12", "13:00", 41_000.0),
                record("2024-10-12", "14:00", 42_000.0),
            ])
            .await
            .unwrap();
        assert_eq!(second, SaveOutcome { inserted: 1, updated: 1 });

        let rows = store.recent_energy_data(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        // Latest hour first, with the overwritten value.
        assert_eq!(rows[0].hour, "14:00");
        assert_eq!(rows[1].total, 41_000.0);
    }

    #[tokio::test]
    async fn recent_is_row_limited_not_windowed() {
        let store = store().await;
        let batch: Vec<_> = (0..30)
            .map(|h| record("2024-10-12", &format!("{h:02}:00"), 1_000.0 + h as f64))
            .collect();
        store.save_energy_data(&batch).await.unwrap();

        let rows = store.recent_energy_data(5).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].hour, "29:00");
    }

    #[tokio::test]
    async fn date_range_is_inclusive_and_ascending() {
        let store = store().await;
        store
            .save_energy_data(&[
                record("2024-10-10", "00:00", 1.0),
                record("2024-10-11", "00:00", 2.0),
                record("2024-10-12", "00:00", 3.0),
            ])
            .await
            .unwrap();

        let rows = store
            .energy_data_by_date_range("2024-10-10", "2024-10-11")
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2024-10-10");
        assert_eq!(rows[1].date, "2024-10-11");
    }
}
