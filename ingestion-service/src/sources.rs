//! Trait seams over the upstream clients so the scheduler and backfill
//! runners can be exercised against scripted fakes in tests.

use async_trait::async_trait;
use market_client::domain::{ConsumptionRecord, GenerationRecord, PriceRecord, WeatherRecord};
use market_client::error::{MarketError, WeatherError};
use market_client::{EpiasClient, OpenMeteoClient};

#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn realtime_generation(&self) -> Result<Vec<GenerationRecord>, MarketError>;
    async fn historical_generation(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<GenerationRecord>, MarketError>;
    async fn price(&self, start: &str, end: &str) -> Result<Vec<PriceRecord>, MarketError>;
    async fn consumption(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<ConsumptionRecord>, MarketError>;
}

#[async_trait]
impl MarketSource for EpiasClient {
    async fn realtime_generation(&self) -> Result<Vec<GenerationRecord>, MarketError> {
        EpiasClient::realtime_generation(self).await
    }

    async fn historical_generation(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<GenerationRecord>, MarketError> {
        EpiasClient::historical_generation(self, start, end).await
    }

    async fn price(&self, start: &str, end: &str) -> Result<Vec<PriceRecord>, MarketError> {
        EpiasClient::price(self, start, end).await
    }

    async fn consumption(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<ConsumptionRecord>, MarketError> {
        EpiasClient::consumption(self, start, end).await
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current_weather(&self) -> Result<Vec<WeatherRecord>, WeatherError>;
    async fn historical_weather(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<WeatherRecord>, WeatherError>;
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn current_weather(&self) -> Result<Vec<WeatherRecord>, WeatherError> {
        OpenMeteoClient::current_weather(self).await
    }

    async fn historical_weather(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<WeatherRecord>, WeatherError> {
        OpenMeteoClient::historical_weather(self, start, end).await
    }
}
