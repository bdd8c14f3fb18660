use std::time::Duration;

use serde::Deserialize;

use crate::domain::WeatherRecord;
use crate::error::WeatherError;

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Hourly variables requested from the API, in the order they are zipped.
const HOURLY_PARAMS: &str = "temperature_2m,windspeed_10m,winddirection_10m,\
direct_radiation,precipitation,cloudcover,relativehumidity_2m";

const UPSTREAM_TIMEZONE: &str = "Europe/Istanbul";

const CURRENT_TIMEOUT: Duration = Duration::from_secs(10);
const HISTORICAL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Location {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            city: "Istanbul".to_string(),
            latitude: 41.01,
            longitude: 28.94,
        }
    }
}

/// Client for the open-meteo forecast/archive API. Unauthenticated; the
/// hourly series come back as parallel arrays indexed by timestamp.
#[derive(Clone)]
pub struct OpenMeteoClient {
    http: reqwest::Client,
    location: Location,
}

impl OpenMeteoClient {
    pub fn new(location: Location) -> Self {
        Self {
            http: reqwest::Client::new(),
            location,
        }
    }

    /// Today's hourly weather from the forecast endpoint.
    pub async fn current_weather(&self) -> Result<Vec<WeatherRecord>, WeatherError> {
        let query = [
            ("latitude", self.location.latitude.to_string()),
            ("longitude", self.location.longitude.to_string()),
            ("hourly", HOURLY_PARAMS.to_string()),
            ("timezone", UPSTREAM_TIMEZONE.to_string()),
            ("forecast_days", "1".to_string()),
        ];
        self.fetch(FORECAST_URL, &query, CURRENT_TIMEOUT).await
    }

    /// Hourly weather for an inclusive `YYYY-MM-DD` range from the archive
    /// endpoint.
    pub async fn historical_weather(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<WeatherRecord>, WeatherError> {
        let query = [
            ("latitude", self.location.latitude.to_string()),
            ("longitude", self.location.longitude.to_string()),
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
            ("hourly", HOURLY_PARAMS.to_string()),
            ("timezone", UPSTREAM_TIMEZONE.to_string()),
        ];
        self.fetch(ARCHIVE_URL, &query, HISTORICAL_TIMEOUT).await
    }

    async fn fetch(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<Vec<WeatherRecord>, WeatherError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| WeatherError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::Fetch(format!("status {status}: {body}")));
        }

        let payload: WeatherResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Fetch(e.to_string()))?;

        let records = zip_hourly(payload.hourly, &self.location)?;
        tracing::debug!(count = records.len(), city = %self.location.city, "weather fetch completed");
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    hourly: Option<HourlySeries>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlySeries {
    time: Option<Vec<String>>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m: Vec<Option<f64>>,
    #[serde(default)]
    winddirection_10m: Vec<Option<f64>>,
    #[serde(default)]
    direct_radiation: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    cloudcover: Vec<Option<f64>>,
    #[serde(default)]
    relativehumidity_2m: Vec<Option<f64>>,
}

/// Zips the parallel hourly arrays into one record per timestamp. Missing or
/// null numeric points default to 0 rather than being dropped.
fn zip_hourly(
    hourly: Option<HourlySeries>,
    location: &Location,
) -> Result<Vec<WeatherRecord>, WeatherError> {
    let series = hourly.ok_or(WeatherError::MissingHourly)?;
    let time = series.time.ok_or(WeatherError::MissingHourly)?;

    let mut records = Vec::with_capacity(time.len());
    for (i, timestamp) in time.iter().enumerate() {
        let (date, hour) = split_timestamp(timestamp)?;
        records.push(WeatherRecord {
            date,
            hour,
            temperature: value_at(&series.temperature_2m, i),
            windspeed: value_at(&series.windspeed_10m, i),
            winddirection: value_at(&series.winddirection_10m, i),
            direct_radiation: value_at(&series.direct_radiation, i),
            precipitation: value_at(&series.precipitation, i),
            cloudcover: value_at(&series.cloudcover, i),
            humidity: value_at(&series.relativehumidity_2m, i),
            city: location.city.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
        });
    }
    Ok(records)
}

fn value_at(series: &[Option<f64>], index: usize) -> f64 {
    series.get(index).copied().flatten().unwrap_or(0.0)
}

/// Splits `2024-10-12T14:00` into the stored local-midnight day marker and an
/// `HH:00` hour label.
fn split_timestamp(timestamp: &str) -> Result<(String, String), WeatherError> {
    let bad = || WeatherError::BadTimestamp(timestamp.to_string());
    let (day, rest) = timestamp.split_once('T').ok_or_else(bad)?;
    let hour = rest.get(..2).ok_or_else(bad)?;
    if day.len() != 10 || !hour.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    Ok((format!("{day}T00:00:00+03:00"), format!("{hour}:00")))
}
