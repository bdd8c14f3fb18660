use serde::{Deserialize, Serialize};

/// One hour of weather for one city, keyed (date, hour, city).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherRecord {
    pub date: String,
    pub hour: String,
    pub temperature: f64,
    pub windspeed: f64,
    pub winddirection: f64,
    pub direct_radiation: f64,
    pub precipitation: f64,
    pub cloudcover: f64,
    pub humidity: f64,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}
