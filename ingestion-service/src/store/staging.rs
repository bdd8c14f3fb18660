use market_client::domain::GenerationRecord;
use sqlx::Row;

use super::{EnergyStore, SaveOutcome, StoreError};

impl EnergyStore {
    /// Historical generation lands in a staging table first. Rows carry
    /// quality flags so a later review pass can promote clean data into
    /// `energy_data`; promotion itself is a manual step for now.
    pub async fn save_staging_data(
        &self,
        records: &[GenerationRecord],
    ) -> Result<SaveOutcome, StoreError> {
        let mut outcome = SaveOutcome::default();
        let mut tx = self.pool().begin().await?;

        for record in records {
            let existing: i64 = sqlx::query(
                "SELECT COUNT(*) AS n FROM energy_data_staging WHERE date = ? AND hour = ?",
            )
            .bind(&record.date)
            .bind(&record.hour)
            .fetch_one(&mut *tx)
            .await?
            .get("n");

            sqlx::query(
                r#"
                INSERT INTO energy_data_staging (
                    date, hour, total, natural_gas, dammed_hydro, lignite, river,
                    import_coal, wind, sun, fuel_oil, geothermal, asphaltite_coal,
                    black_coal, biomass, naphta, lng, import_export, waste_heat,
                    is_valid, is_interpolated, is_outlier
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, 0)
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

    pub async fn staging_count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM energy_data_staging")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staging_does_not_touch_live_table() {
        let store = EnergyStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();

        let record = GenerationRecord {
            date: "2024-04-01".to_string(),
            hour: "10:00".to_string(),
            total: 38_000.0,
            ..Default::default()
        };
        store.save_staging_data(&[record]).await.unwrap();

        assert_eq!(store.staging_count().await.unwrap(), 1);
        assert!(store.recent_energy_data(10).await.unwrap().is_empty());
    }
}
