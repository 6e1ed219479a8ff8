//! Entry point for weather lookups.
//!
//! Every operation runs the same pipeline: validate the request, consult the
//! cache, call the provider under the retry policy, validate the payload,
//! then record the result. Favorites and history are kept in memory and
//! written through to [`Storage`] after each mutation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use skycast_core::{Config, StorageError, Units, WeatherError};

use crate::cache::{
    cache_key, CacheBackend, CacheGateway, CacheTtls, MemoryCache, FORECAST_NAMESPACE,
    LOCATION_SEARCH_NAMESPACE, WEATHER_NAMESPACE,
};
use crate::fanout::{collect_results, fan_out, record_views, FavoriteWeather};
use crate::favorites::{FavoriteError, FavoritesDocument, FavoritesStore, FAVORITES_DOCUMENT};
use crate::history::{HistoryDocument, HistoryLog, DEFAULT_HISTORY_LIMIT, HISTORY_DOCUMENT};
use crate::integrity::{validate_forecast, validate_observation};
use crate::location::{Geolocator, NoLocation};
use crate::provider::WeatherApi;
use crate::retry::{RetryConfig, RetryExecutor};
use crate::storage::{MemoryStorage, Storage};
use crate::types::{FavoriteCity, Forecast, HistoryEntry, Location, LocationQuery, Observation};
use crate::validation::{
    clean_city, validate_city, validate_coordinates, validate_forecast_days, MIN_CITY_LENGTH,
};

pub const DEFAULT_FORECAST_DAYS: u32 = 5;
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Tunables for a [`WeatherOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub retry: RetryConfig,
    pub cache_ttls: CacheTtls,
    pub history_limit: usize,
    pub default_units: Units,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            cache_ttls: CacheTtls::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_units: Units::Metric,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            retry: RetryConfig::from(&config.retry),
            cache_ttls: CacheTtls::from(&config.cache),
            history_limit: config.storage.history_limit,
            default_units: config.weather.default_units,
        }
    }
}

/// Builds a [`WeatherOrchestrator`]. Only the provider is required.
pub struct OrchestratorBuilder {
    provider: Arc<dyn WeatherApi>,
    cache: Option<Arc<dyn CacheBackend>>,
    storage: Option<Arc<dyn Storage>>,
    geolocator: Option<Arc<dyn Geolocator>>,
    config: OrchestratorConfig,
    cancel: Option<CancellationToken>,
}

impl OrchestratorBuilder {
    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn geolocator(mut self, geolocator: Arc<dyn Geolocator>) -> Self {
        self.geolocator = Some(geolocator);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a cancellation token with the caller (e.g. UI teardown).
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Load favorites and history from storage and assemble the orchestrator.
    ///
    /// Unreadable stored documents are logged and replaced with empty ones.
    pub async fn build(self) -> WeatherOrchestrator {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let cancel = self.cancel.unwrap_or_default();
        let history_limit = self.config.history_limit;

        let favorites = match load_document(&storage, FAVORITES_DOCUMENT).await {
            Some(value) => match FavoritesDocument::from_value(value) {
                Ok(document) => FavoritesStore::from_document(document),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable favorites document: {}", e);
                    FavoritesStore::new()
                }
            },
            None => FavoritesStore::new(),
        };

        let history = match load_document(&storage, HISTORY_DOCUMENT).await {
            Some(value) => match HistoryDocument::from_value(value) {
                Ok(document) => HistoryLog::from_document(document, history_limit),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable history document: {}", e);
                    HistoryLog::new(history_limit)
                }
            },
            None => HistoryLog::new(history_limit),
        };

        tracing::info!(
            "Weather orchestrator ready ({} favorites, {} history entries)",
            favorites.len(),
            history.len()
        );

        WeatherOrchestrator {
            provider: self.provider,
            cache: CacheGateway::new(
                self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
                self.config.cache_ttls.clone(),
            ),
            storage,
            geolocator: self.geolocator.unwrap_or_else(|| Arc::new(NoLocation)),
            favorites: Mutex::new(favorites),
            history: Mutex::new(history),
            retry: RetryExecutor::new(self.config.retry.clone(), cancel.clone()),
            config: self.config,
            cancel,
        }
    }
}

/// Coordinates validation, caching, retries and persistence for weather
/// lookups.
///
/// All methods take `&self`; the orchestrator can be shared behind an `Arc`
/// and driven from many tasks at once.
pub struct WeatherOrchestrator {
    provider: Arc<dyn WeatherApi>,
    cache: CacheGateway,
    storage: Arc<dyn Storage>,
    geolocator: Arc<dyn Geolocator>,
    // Held across the write-through so concurrent mutations persist in order
    favorites: Mutex<FavoritesStore>,
    history: Mutex<HistoryLog>,
    retry: RetryExecutor,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl WeatherOrchestrator {
    pub fn builder(provider: Arc<dyn WeatherApi>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            provider,
            cache: None,
            storage: None,
            geolocator: None,
            config: OrchestratorConfig::default(),
            cancel: None,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn default_units(&self) -> Units {
        self.config.default_units
    }

    /// Current weather for a city.
    ///
    /// # Errors
    /// `Validation` for a bad city name (no provider call is made),
    /// `ProviderTransient`/`ProviderFatal` when the provider fails,
    /// `DataIntegrity` for an implausible payload, `Cancelled` on shutdown.
    pub async fn get_current_weather(
        &self,
        city: &str,
        units: Units,
        use_cache: bool,
    ) -> Result<Observation, WeatherError> {
        validate_city(city)?;
        let city = clean_city(city);
        let key = cache_key(WEATHER_NAMESPACE, &[&city, &units]);

        self.fetch_current(&key, LocationQuery::City(city), units, use_cache)
            .await
    }

    /// Multi-day forecast for a city.
    ///
    /// # Errors
    /// `Validation` when `days` is outside 1..=16 or the city name is bad,
    /// otherwise as for [`Self::get_current_weather`].
    pub async fn get_forecast(
        &self,
        city: &str,
        days: u32,
        units: Units,
        use_cache: bool,
    ) -> Result<Forecast, WeatherError> {
        validate_forecast_days(days)?;
        validate_city(city)?;
        let city = clean_city(city);
        let key = cache_key(FORECAST_NAMESPACE, &[&city, &days, &units]);

        if use_cache {
            if let Some(forecast) = self.cache.get::<Forecast>(&key) {
                return Ok(forecast);
            }
        }

        let query = LocationQuery::City(city);
        let provider = self.provider.as_ref();
        let query_ref = &query;
        let payload = self
            .retry
            .run("forecast", || provider.forecast(query_ref, days, units))
            .await?;
        let forecast = validate_forecast(payload)?;

        if use_cache {
            self.cache.store(FORECAST_NAMESPACE, &key, &forecast, None);
        }
        tracing::info!(
            "Fetched {}-day forecast for {}",
            forecast.days().len(),
            forecast.location().display_name()
        );
        Ok(forecast)
    }

    /// Look up locations by name. Queries shorter than two characters, or a
    /// zero limit, return an empty list without contacting the provider.
    ///
    /// # Errors
    /// `ProviderTransient`/`ProviderFatal` when the provider fails,
    /// `Cancelled` on shutdown.
    pub async fn search_locations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Location>, WeatherError> {
        let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        if query.chars().count() < MIN_CITY_LENGTH || limit == 0 {
            return Ok(Vec::new());
        }

        let normalized = query.to_lowercase();
        let key = cache_key(LOCATION_SEARCH_NAMESPACE, &[&normalized, &limit]);
        if let Some(locations) = self.cache.get::<Vec<Location>>(&key) {
            return Ok(locations);
        }

        let provider = self.provider.as_ref();
        let query_ref = query.as_str();
        let mut locations = self
            .retry
            .run("location search", || provider.search_locations(query_ref, limit))
            .await?;
        locations.truncate(limit);

        // An empty answer may just be a typo; don't pin it for an hour
        if !locations.is_empty() {
            self.cache
                .store(LOCATION_SEARCH_NAMESPACE, &key, &locations, None);
        }
        Ok(locations)
    }

    /// Current weather at the device position.
    ///
    /// # Errors
    /// `LocationUnavailable` when the geolocator has no position, otherwise
    /// as for [`Self::get_current_weather`].
    pub async fn get_current_location_weather(
        &self,
        units: Units,
        use_cache: bool,
    ) -> Result<Observation, WeatherError> {
        let geolocator = self.geolocator.clone();
        let lookup = tokio::task::spawn_blocking(move || geolocator.locate());

        let located = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WeatherError::Cancelled),
            joined = lookup => match joined {
                Ok(position) => position,
                Err(e) => {
                    tracing::error!("Geolocation task failed: {}", e);
                    None
                }
            },
        };
        let position = located.ok_or(WeatherError::LocationUnavailable)?;

        validate_coordinates(position.latitude, position.longitude)?;
        let location = match position.city_name {
            Some(name) => Location::new(name, "", position.latitude, position.longitude)?,
            None => Location::from_coordinates(position.latitude, position.longitude)?,
        };
        tracing::debug!("Device location resolved to {}", location.display_name());

        let key = coordinate_key(&location, units);
        self.fetch_current(&key, LocationQuery::Resolved(location), units, use_cache)
            .await
    }

    /// Resolve `city` and pin it as a favorite.
    ///
    /// Returns `Ok(false)` if it is already a favorite. A failed write to
    /// storage is logged; the favorite still counts as added.
    ///
    /// # Errors
    /// `Validation` for a bad city name, `LocationNotFound` when nothing
    /// matches, or a provider error from the lookup.
    pub async fn add_favorite_city(
        &self,
        city: &str,
        nickname: Option<String>,
    ) -> Result<bool, WeatherError> {
        validate_city(city)?;
        let city = clean_city(city);

        if self.favorites.lock().await.contains(&city) {
            tracing::debug!("{} is already a favorite", city);
            return Ok(false);
        }

        let location = self
            .search_locations(&city, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::LocationNotFound(city.clone()))?;

        let mut favorites = self.favorites.lock().await;
        match favorites.add(location, nickname) {
            Ok(favorite) => {
                tracing::info!("Added favorite {}", favorite.location.display_name());
            }
            Err(FavoriteError::AlreadyExists(name)) => {
                tracing::debug!("{} is already a favorite", name);
                return Ok(false);
            }
        }
        self.persist_favorites(&favorites).await;
        Ok(true)
    }

    /// Remove a favorite by location name or nickname, ignoring case.
    /// Returns whether anything was removed.
    pub async fn remove_favorite_city(&self, name: &str) -> bool {
        let mut favorites = self.favorites.lock().await;
        match favorites.remove(name) {
            Some(removed) => {
                tracing::info!("Removed favorite {}", removed.location.display_name());
                self.persist_favorites(&favorites).await;
                true
            }
            None => false,
        }
    }

    /// Current weather for every favorite, fetched concurrently and
    /// returned in favorites order. Failed fetches yield `weather: None`.
    ///
    /// Favorites are fetched by their saved coordinates, so provider names
    /// such as "Halle (Saale)" never go back through city-name validation.
    pub async fn get_weather_for_favorites(&self, units: Units) -> Vec<FavoriteWeather> {
        let favorites = self.favorites().await;
        if favorites.is_empty() {
            return Vec::new();
        }

        let outcomes = fan_out(favorites, |favorite: FavoriteCity| async move {
            let key = coordinate_key(&favorite.location, units);
            let query = LocationQuery::Resolved(favorite.location);
            self.fetch_current(&key, query, units, true).await
        })
        .await;
        let results = collect_results(outcomes);

        let mut store = self.favorites.lock().await;
        if record_views(&mut store, &results, Utc::now()) > 0 {
            self.persist_favorites(&store).await;
        }
        results
    }

    /// Snapshot of the favorites list.
    pub async fn favorites(&self) -> Vec<FavoriteCity> {
        self.favorites.lock().await.list().to_vec()
    }

    /// Up to `count` history entries, newest first.
    pub async fn history(&self, count: usize) -> Vec<HistoryEntry> {
        self.history.lock().await.recent(count)
    }

    /// Drop all history entries. Returns whether the change was persisted.
    pub async fn clear_history(&self) -> bool {
        let mut history = self.history.lock().await;
        history.clear();
        self.persist_history(&history).await
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("Weather cache cleared");
    }

    /// Abort in-flight and future provider calls. Irreversible.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn fetch_current(
        &self,
        key: &str,
        query: LocationQuery,
        units: Units,
        use_cache: bool,
    ) -> Result<Observation, WeatherError> {
        if use_cache {
            if let Some(observation) = self.cache.get::<Observation>(key) {
                return Ok(observation);
            }
        }

        let provider = self.provider.as_ref();
        let query_ref = &query;
        let payload = self
            .retry
            .run("current weather", || provider.current_weather(query_ref, units))
            .await?;
        let observation = validate_observation(payload)?;

        if use_cache {
            self.cache.store(WEATHER_NAMESPACE, key, &observation, None);
        }
        self.record_history(&observation).await;

        tracing::info!(
            "Fetched weather for {}: {} {}",
            observation.location().display_name(),
            observation.temperature().format(),
            observation.condition()
        );
        Ok(observation)
    }

    async fn record_history(&self, observation: &Observation) {
        let mut history = self.history.lock().await;
        let dropped = history.append(HistoryEntry::from_observation(observation));
        if dropped > 0 {
            tracing::debug!("History full, dropped {} oldest entries", dropped);
        }
        self.persist_history(&history).await;
    }

    async fn persist_favorites(&self, favorites: &FavoritesStore) -> bool {
        match favorites.to_document().to_value() {
            Ok(value) => save_document(&self.storage, FAVORITES_DOCUMENT, value).await,
            Err(e) => {
                tracing::error!("Failed to serialize favorites: {}", e);
                false
            }
        }
    }

    async fn persist_history(&self, history: &HistoryLog) -> bool {
        match history.to_document().to_value() {
            Ok(value) => save_document(&self.storage, HISTORY_DOCUMENT, value).await,
            Err(e) => {
                tracing::error!("Failed to serialize history: {}", e);
                false
            }
        }
    }
}

/// Cache key for a resolved location: coordinates rounded to 4 decimals.
fn coordinate_key(location: &Location, units: Units) -> String {
    let latitude = format!("{:.4}", location.latitude());
    let longitude = format!("{:.4}", location.longitude());
    cache_key(WEATHER_NAMESPACE, &[&latitude, &longitude, &units])
}

async fn load_document(storage: &Arc<dyn Storage>, name: &'static str) -> Option<Value> {
    let storage = storage.clone();
    let result = tokio::task::spawn_blocking(move || storage.load_data(name))
        .await
        .map_err(|e| StorageError::Unavailable(format!("storage task failed: {}", e)))
        .and_then(|r| r);

    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Failed to load {} document: {}", name, e);
            None
        }
    }
}

/// Write a document on the blocking pool. The write completes even if the
/// calling future is dropped.
async fn save_document(storage: &Arc<dyn Storage>, name: &'static str, value: Value) -> bool {
    let storage = storage.clone();
    let result = tokio::task::spawn_blocking(move || storage.save_data(&value, name))
        .await
        .map_err(|e| StorageError::Unavailable(format!("storage task failed: {}", e)))
        .and_then(|r| r);

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Failed to save {} document: {}", name, e);
            false
        }
    }
}
