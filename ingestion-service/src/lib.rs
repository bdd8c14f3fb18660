pub mod backfill;
pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod scheduler;
pub mod sources;
pub mod store;

pub use store::{EnergyStore, SaveOutcome};
