//! Synchronous wrapper for callers without an async runtime.
//!
//! Must not be used from inside a tokio runtime; `block_on` panics there.

use std::sync::Arc;

use tokio::runtime::Runtime;

use skycast_core::{Units, WeatherError};

use crate::fanout::FavoriteWeather;
use crate::orchestrator::{OrchestratorBuilder, WeatherOrchestrator};
use crate::types::{FavoriteCity, Forecast, HistoryEntry, Location, Observation};

/// Blocking handle to a [`WeatherOrchestrator`] with its own runtime.
pub struct BlockingWeatherClient {
    runtime: Runtime,
    inner: Arc<WeatherOrchestrator>,
}

impl BlockingWeatherClient {
    /// Start a runtime and build the orchestrator on it.
    ///
    /// # Errors
    /// Returns an error if the runtime cannot be created.
    pub fn new(builder: OrchestratorBuilder) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("skycast-tokio")
            .build()?;
        let inner = Arc::new(runtime.block_on(builder.build()));
        Ok(Self { runtime, inner })
    }

    /// Shared handle for async code running alongside this client.
    pub fn orchestrator(&self) -> Arc<WeatherOrchestrator> {
        self.inner.clone()
    }

    pub fn get_current_weather(
        &self,
        city: &str,
        units: Units,
        use_cache: bool,
    ) -> Result<Observation, WeatherError> {
        self.runtime
            .block_on(self.inner.get_current_weather(city, units, use_cache))
    }

    pub fn get_forecast(
        &self,
        city: &str,
        days: u32,
        units: Units,
        use_cache: bool,
    ) -> Result<Forecast, WeatherError> {
        self.runtime
            .block_on(self.inner.get_forecast(city, days, units, use_cache))
    }

    pub fn search_locations(&self, query: &str, limit: usize) -> Result<Vec<Location>, WeatherError> {
        self.runtime.block_on(self.inner.search_locations(query, limit))
    }

    pub fn get_current_location_weather(
        &self,
        units: Units,
        use_cache: bool,
    ) -> Result<Observation, WeatherError> {
        self.runtime
            .block_on(self.inner.get_current_location_weather(units, use_cache))
    }

    pub fn add_favorite_city(
        &self,
        city: &str,
        nickname: Option<String>,
    ) -> Result<bool, WeatherError> {
        self.runtime
            .block_on(self.inner.add_favorite_city(city, nickname))
    }

    pub fn remove_favorite_city(&self, name: &str) -> bool {
        self.runtime.block_on(self.inner.remove_favorite_city(name))
    }

    pub fn get_weather_for_favorites(&self, units: Units) -> Vec<FavoriteWeather> {
        self.runtime
            .block_on(self.inner.get_weather_for_favorites(units))
    }

    pub fn favorites(&self) -> Vec<FavoriteCity> {
        self.runtime.block_on(self.inner.favorites())
    }

    pub fn history(&self, count: usize) -> Vec<HistoryEntry> {
        self.runtime.block_on(self.inner.history(count))
    }

    pub fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}
