use market_client::domain::{ConsumptionRecord, PriceRecord};
use sqlx::Row;

use super::{EnergyStore, SaveOutcome, StoreError};

impl EnergyStore {
    pub async fn save_price_data(
        &self,
        records: &[PriceRecord],
    ) -> Result<SaveOutcome, StoreError> {
        let mut outcome = SaveOutcome::default();
        let mut tx = self.pool().begin().await?;

        for record in records {
            let existing: i64 =
                sqlx::query("SELECT COUNT(*) AS n FROM ptf_data WHERE date = ? AND hour = ?")
                    .bind(&record.date)
                    .bind(&record.hour)
                    .fetch_one(&mut *tx)
                    .await?
                    .get("n");

            sqlx::query(
                "INSERT INTO ptf_data (date, hour, price_try, price_usd, price_eur)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(date, hour) DO UPDATE SET
                     price_try = excluded.price_try,
                     price_usd = excluded.price_usd,
                     price_eur = excluded.price_eur",
            )
            .bind(&record.date)
            .bind(&record.hour)
            .bind(record.price)
            .bind(record.price_usd)
            .bind(record.price_eur)
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

    pub async fn save_consumption_data(
        &self,
        records: &[ConsumptionRecord],
    ) -> Result<SaveOutcome, StoreError> {
        let mut outcome = SaveOutcome::default();
        let mut tx = self.pool().begin().await?;

        for record in records {
            let existing: i64 = sqlx::query(
                "SELECT COUNT(*) AS n FROM consumption_data WHERE date = ? AND hour = ?",
            )
            .bind(&record.date)
            .bind(&record.hour)
            .fetch_one(&mut *tx)
            .await?
            .get("n");

            sqlx::query(
                "INSERT INTO consumption_data (date, hour, consumption)
                 VALUES (?, ?, ?)
                 ON CONFLICT(date, hour) DO UPDATE SET
                     consumption = excluded.consumption",
            )
            .bind(&record.date)
            .bind(&record.hour)
            .bind(record.consumption)
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

    pub async fn recent_price_data(&self, limit: i64) -> Result<Vec<PriceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, PriceRecord>(
            "SELECT date, hour, price_try, price_usd, price_eur
             FROM ptf_data
             ORDER BY date DESC, hour DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn recent_consumption_data(
        &self,
        limit: i64,
    ) -> Result<Vec<ConsumptionRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ConsumptionRecord>(
            "SELECT date, hour, consumption
             FROM consumption_data
             ORDER BY date DESC, hour DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn price_data_by_date_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, PriceRecord>(
            "SELECT date, hour, price_try, price_usd, price_eur
             FROM ptf_data
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

    async fn store() -> EnergyStore {
        let store = EnergyStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    #[tokio::test]
    async fn price_upsert_preserves_optional_conversions() {
        let store = store().await;
        let record = PriceRecord {
            date: "2024-10-12".to_string(),
            hour: "03:00".to_string(),
            price: 2450.75,
            price_usd: Some(71.4),
            price_eur: None,
        };

        let outcome = store.save_price_data(&[record.clone()]).await.unwrap();
        assert_eq!(outcome.inserted, 1);

        let rows = store.recent_price_data(5).await.unwrap();
        assert_eq!(rows[0].price, 2450.75);
        assert_eq!(rows[0].price_usd, Some(71.4));
        assert_eq!(rows[0].price_eur, None);

        // Overwrite with a revised price.
        let revised = PriceRecord { price: 2500.0, ..record };
        let outcome = store.save_price_data(&[revised]).await.unwrap();
        assert_eq!(outcome.updated, 1);
        let rows = store.recent_price_data(5).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 2500.0);
    }

    #[tokio::test]
    async fn consumption_upsert_is_keyed_on_date_hour() {
        let store = store().await;
        let records = vec![
            ConsumptionRecord {
                date: "2024-10-12".to_string(),
                hour: "05:00".to_string(),
                consumption: 31_450.2,
            },
            ConsumptionRecord {
                date: "2024-10-12".to_string(),
                hour: "05:00".to_string(),
                consumption: 31_500.0,
            },
        ];

        let outcome = store.save_consumption_data(&records).await.unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.updated, 1);

        let rows = store.recent_consumption_data(5).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].consumption, 31_500.0);
    }
}
