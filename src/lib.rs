//! Nightsight — observability scoring for astrophotography.
//!
//! Fuses two public forecast feeds (Open-Meteo hourly weather, 7Timer
//! astronomical seeing) with a local moon model into a single 0–100 score
//! per hour and per day, with uncertainty bands and condition warnings.
//!
//! The [`services::forecast::Engine`] is the entry point: construct it with
//! an [`config::EngineConfig`], a [`cache::TieredCache`] and the observer's
//! UTC offset, then call `load_conditions` or `load_forecast`.

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use cache::{FileStore, TieredCache};
pub use config::EngineConfig;
pub use errors::AppError;
pub use services::forecast::{build_forecast, Engine};
