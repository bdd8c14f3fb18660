use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

use crate::domain::{ConsumptionRecord, GenerationRecord, PriceRecord};
use crate::error::{AuthError, DataKind, MarketError};

const AUTH_URL: &str = "https://giris.epias.com.tr/cas/v1/tickets";
const REALTIME_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/dashboard/realtime-generation";
const HISTORICAL_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/generation/data/realtime-generation";
const PRICE_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/markets/dam/data/mcp";
const CONSUMPTION_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/consumption/data/realtime-consumption";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DAY_FMT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// `YYYY-MM-DD`, the parameter format of the historical generation endpoint.
pub fn day_param(date: Date) -> String {
    date.format(&DAY_FMT).expect("day format")
}

/// `YYYY-MM-DDT00:00:00+03:00`, the parameter format of the price and
/// consumption endpoints.
pub fn timestamp_param(date: Date) -> String {
    format!("{}T00:00:00+03:00", day_param(date))
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Reads `EPIAS_USERNAME` / `EPIAS_PASSWORD` from the environment.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("EPIAS_USERNAME").ok()?;
        let password = std::env::var("EPIAS_PASSWORD").ok()?;
        Some(Self { username, password })
    }
}

/// Client for the transparency-platform market API.
///
/// Every fetch acquires a fresh short-lived ticket; the upstream publishes
/// with hours of delay, so the extra auth round-trip per call is not worth
/// caching around.
#[derive(Clone)]
pub struct EpiasClient {
    http: reqwest::Client,
    credentials: Option<Credentials>,
}

impl EpiasClient {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    /// POSTs the form-encoded credentials and extracts the ticket. The
    /// endpoint answers either `{"tgt": "...", ...}` or the bare ticket text.
    pub async fn acquire_ticket(&self) -> Result<String, AuthError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(AuthError::MissingCredentials)?;

        let params = [
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
        ];
        let response = self
            .http
            .post(AUTH_URL)
            .form(&params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::Rejected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(format!("status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Rejected(e.to_string()))?;
        parse_ticket(&body)
    }

    /// Current-day hourly generation; the endpoint takes no parameters.
    pub async fn realtime_generation(&self) -> Result<Vec<GenerationRecord>, MarketError> {
        self.fetch_items(DataKind::RealtimeGeneration, REALTIME_URL, None)
            .await
    }

    /// Hourly generation for an inclusive `YYYY-MM-DD` date range.
    pub async fn historical_generation(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<GenerationRecord>, MarketError> {
        self.fetch_items(
            DataKind::HistoricalGeneration,
            HISTORICAL_URL,
            Some((start, end)),
        )
        .await
    }

    /// Day-ahead clearing prices; dates in the extended timestamp format,
    /// see [`timestamp_param`].
    pub async fn price(&self, start: &str, end: &str) -> Result<Vec<PriceRecord>, MarketError> {
        self.fetch_items(DataKind::Price, PRICE_URL, Some((start, end)))
            .await
    }

    /// Realtime consumption; dates in the extended timestamp format.
    pub async fn consumption(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<ConsumptionRecord>, MarketError> {
        self.fetch_items(DataKind::Consumption, CONSUMPTION_URL, Some((start, end)))
            .await
    }

    async fn fetch_items<T: DeserializeOwned>(
        &self,
        kind: DataKind,
        url: &str,
        range: Option<(&str, &str)>,
    ) -> Result<Vec<T>, MarketError> {
        let ticket = self.acquire_ticket().await?;

        let owned_range = range.map(|(s, e)| (s.to_string(), e.to_string()));
        let fetch_err = |message: String| MarketError::Fetch {
            kind,
            range: owned_range.clone(),
            message,
        };

        let mut request = self
            .http
            .get(url)
            .header("TGT", ticket)
            .timeout(REQUEST_TIMEOUT);
        if let Some((start, end)) = range {
            request = request.query(&[("startDate", start), ("endDate", end)]);
        }

        let response = request.send().await.map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fetch_err(format!("status {status}: {body}")));
        }

        let payload: ItemsResponse<T> = response
            .json()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let items = payload.items.unwrap_or_default();
        tracing::debug!(kind = %kind, count = items.len(), "market fetch completed");
        Ok(items)
    }
}

#[derive(Deserialize)]
struct ItemsResponse<T> {
    // A named default fn keeps serde from inferring a `T: Default` bound.
    #[serde(default = "Option::default")]
    items: Option<Vec<T>>,
}

fn parse_ticket(body: &str) -> Result<String, AuthError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("tgt")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(AuthError::InvalidResponse),
        Ok(Value::String(ticket)) => Ok(ticket),
        Ok(_) => Err(AuthError::InvalidResponse),
        // Not JSON: the CAS endpoint may answer with the raw ticket text.
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                Err(AuthError::InvalidResponse)
            } else {
                Ok(trimmed.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_ticket_object() {
        let body = r#"{"tgt": "TGT-123-abc", "created": "2024-10-12", "code": 201}"#;
        assert_eq!(parse_ticket(body).unwrap(), "TGT-123-abc");
    }

    #[test]
    fn parses_bare_json_string() {
        assert_eq!(parse_ticket(r#""TGT-456-def""#).unwrap(), "TGT-456-def");
    }

    #[test]
    fn parses_raw_ticket_text() {
        assert_eq!(parse_ticket("TGT-789-ghi\n").unwrap(), "TGT-789-ghi");
    }

    #[test]
    fn rejects_object_without_ticket_field() {
        let err = parse_ticket(r#"{"code": 401}"#).unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse));
    }

    #[test]
    fn rejects_non_string_json() {
        assert!(matches!(
            parse_ticket("[1, 2, 3]"),
            Err(AuthError::InvalidResponse)
        ));
        assert!(matches!(parse_ticket(""), Err(AuthError::InvalidResponse)));
    }

    #[test]
    fn items_envelope_needs_no_default_on_the_row_type() {
        // Deliberately no Default impl on the row type.
        #[derive(Deserialize)]
        struct Row {
            value: String,
        }

        let empty: ItemsResponse<Row> = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_none());

        let full: ItemsResponse<Row> =
            serde_json::from_str(r#"{"items": [{"value": "x"}]}"#).unwrap();
        assert_eq!(full.items.unwrap()[0].value, "x");
    }

    #[test]
    fn date_params_match_upstream_formats() {
        let d = date!(2024 - 03 - 07);
        assert_eq!(day_param(d), "2024-03-07");
        assert_eq!(timestamp_param(d), "2024-03-07T00:00:00+03:00");
    }
}
