use serde::{Deserialize, Serialize};

/// Hourly day-ahead market clearing price. `price` is in local currency;
/// the USD/EUR conversions are optional on both the wire and the row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub date: String,
    #[serde(default)]
    pub hour: String,
    #[serde(default)]
    #[sqlx(rename = "price_try")]
    pub price: f64,
    #[serde(default)]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub price_eur: Option<f64>,
}
