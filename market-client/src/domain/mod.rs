mod consumption;
mod generation;
mod price;
mod weather;

pub use consumption::ConsumptionRecord;
pub use generation::GenerationRecord;
pub use price::PriceRecord;
pub use weather::WeatherRecord;
