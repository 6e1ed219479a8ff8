//! Weather retrieval for SkyCast
//!
//! Wraps an external weather provider with request validation, a TTL cache,
//! retries with exponential backoff, payload checks, and persistent
//! favorites and history. [`WeatherOrchestrator`] is the async entry point;
//! [`BlockingWeatherClient`] serves synchronous callers.

pub mod blocking;
pub mod cache;
pub mod fanout;
pub mod favorites;
pub mod history;
pub mod integrity;
pub mod location;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod storage;
pub mod types;
pub mod validation;

pub use blocking::BlockingWeatherClient;
pub use cache::{CacheBackend, CacheGateway, CacheTtls, MemoryCache};
pub use fanout::FavoriteWeather;
pub use favorites::FavoritesStore;
pub use history::HistoryLog;
pub use location::{DevicePosition, FixedLocation, Geolocator, NoLocation};
pub use orchestrator::{
    OrchestratorBuilder, OrchestratorConfig, WeatherOrchestrator, DEFAULT_FORECAST_DAYS,
    DEFAULT_SEARCH_LIMIT,
};
pub use provider::{OpenMeteoProvider, WeatherApi};
pub use retry::{RetryConfig, RetryError, RetryExecutor};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
pub use types::*;
