use market_client::domain::WeatherRecord;
use sqlx::Row;

use super::{EnergyStore, SaveOutcome, StoreError};

impl EnergyStore {
    /// Weather rows are keyed per city: the same (date, hour) can hold one
    /// row for each observed location.
    pub async fn save_weather_data(
        &self,
        records: &[WeatherRecord],
    ) -> Result<SaveOutcome, StoreError> {
        let mut outcome = SaveOutcome::default();
        let mut tx = self.pool().begin().await?;

        for record in records {
            let existing: i64 = sqlx::query(
                "SELECT COUNT(*) AS n FROM weather_data
                 WHERE date = ? AND hour = ? AND city = ?",
            )
            .bind(&record.date)
            .bind(&record.hour)
            .bind(&record.city)
            .fetch_one(&mut *tx)
            .await?
            .get("n");

            sqlx::query(
                "INSERT INTO weather_data (
                     date, hour, temperature, windspeed, winddirection,
                     direct_radiation, precipitation, cloudcover, humidity,
                     city, latitude, longitude
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(date, hour, city) DO UPDATE SET
                     temperature = excluded.temperature,
                     windspeed = excluded.windspeed,
                     winddirection = excluded.winddirection,
                     direct_radiation = excluded.direct_radiation,
                     precipitation = excluded.precipitation,
                     cloudcover = excluded.cloudcover,
                     humidity = excluded.humidity,
                     latitude = excluded.latitude,
                     longitude = excluded.longitude",
            )
            .bind(&record.date)
            .bind(&record.hour)
            .bind(record.temperature)
            .bind(record.windspeed)
            .bind(record.winddirection)
            .bind(record.direct_radiation)
            .bind(record.precipitation)
            .bind(record.cloudcover)
            .bind(record.humidity)
            .bind(&record.city)
            .bind(record.latitude)
            .bind(record.longitude)
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

    pub async fn recent_weather_data(
        &self,
        limit: i64,
        city: Option<&str>,
    ) -> Result<Vec<WeatherRecord>, StoreError> {
        let rows = match city {
            Some(city) => {
                sqlx::query_as::<_, WeatherRecord>(
                    "SELECT date, hour, temperature, windspeed, winddirection,
                            direct_radiation, precipitation, cloudcover, humidity,
                            city, latitude, longitude
                     FROM weather_data
                     WHERE city = ?
                     ORDER BY date DESC, hour DESC
                     LIMIT ?",
                )
                .bind(city)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, WeatherRecord>(
                    "SELECT date, hour, temperature, windspeed, winddirection,
                            direct_radiation, precipitation, cloudcover, humidity,
                            city, latitude, longitude
                     FROM weather_data
                     ORDER BY date DESC, hour DESC
                     LIMIT ?",
                )
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };
        Ok(rows)
    }
}
