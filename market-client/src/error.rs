use std::fmt;

use thiserror::Error;

/// Which market feed a fetch was for; carried on errors so callers can apply
/// per-feed isolation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    RealtimeGeneration,
    HistoricalGeneration,
    Price,
    Consumption,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataKind::RealtimeGeneration => "realtime generation",
            DataKind::HistoricalGeneration => "historical generation",
            DataKind::Price => "price",
            DataKind::Consumption => "consumption",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("market API credentials are not configured")]
    MissingCredentials,
    #[error("unexpected ticket response shape")]
    InvalidResponse,
    #[error("authentication rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Network failure or non-2xx from a data endpoint. `message` includes the
    /// upstream error body when one was returned.
    #[error("{kind} fetch failed: {message}")]
    Fetch {
        kind: DataKind,
        range: Option<(String, String)>,
        message: String,
    },
}

impl MarketError {
    pub fn kind(&self) -> Option<DataKind> {
        match self {
            MarketError::Auth(_) => None,
            MarketError::Fetch { kind, .. } => Some(*kind),
        }
    }
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("no hourly series in weather response")]
    MissingHourly,
    #[error("malformed weather timestamp: {0}")]
    BadTimestamp(String),
    #[error("weather fetch failed: {0}")]
    Fetch(String),
}
