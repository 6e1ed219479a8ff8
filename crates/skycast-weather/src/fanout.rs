//! Concurrent fetches over a set of locations.
//!
//! All fetches run to completion; one failing never cancels or delays the
//! others. Results come back in input order.

use std::future::Future;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use skycast_core::{WeatherError, WeatherErrorKind};

use crate::favorites::FavoritesStore;
use crate::types::{FavoriteCity, Location, Observation};

/// Run `fetch` for every key concurrently and pair each key with its outcome.
pub async fn fan_out<K, T, F, Fut>(keys: Vec<K>, fetch: F) -> Vec<(K, Result<T, WeatherError>)>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, WeatherError>>,
{
    let outcomes = join_all(keys.iter().cloned().map(&fetch)).await;
    keys.into_iter().zip(outcomes).collect()
}

/// Weather for one favorite; `weather` is `None` when its fetch failed.
#[derive(Debug, Clone)]
pub struct FavoriteWeather {
    /// Nickname if set, otherwise the location name
    pub name: String,
    pub location: Location,
    pub weather: Option<Observation>,
    pub failure: Option<WeatherErrorKind>,
}

impl FavoriteWeather {
    fn from_outcome(favorite: FavoriteCity, outcome: Result<Observation, WeatherError>) -> Self {
        let name = favorite.display_name().to_string();
        match outcome {
            Ok(observation) => Self {
                name,
                location: favorite.location,
                weather: Some(observation),
                failure: None,
            },
            Err(e) => {
                tracing::warn!("Weather for favorite '{}' failed: {}", name, e);
                Self {
                    name,
                    location: favorite.location,
                    weather: None,
                    failure: Some(e.kind()),
                }
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.weather.is_some()
    }
}

/// Collapse fan-out outcomes into per-favorite results.
pub fn collect_results(
    outcomes: Vec<(FavoriteCity, Result<Observation, WeatherError>)>,
) -> Vec<FavoriteWeather> {
    let results: Vec<_> = outcomes
        .into_iter()
        .map(|(favorite, outcome)| FavoriteWeather::from_outcome(favorite, outcome))
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    tracing::info!(
        "Fetched weather for {} of {} favorites",
        succeeded,
        results.len()
    );
    results
}

/// Stamp `last_viewed` on every favorite whose fetch succeeded.
/// Returns how many favorites changed.
pub fn record_views(
    store: &mut FavoritesStore,
    results: &[FavoriteWeather],
    at: DateTime<Utc>,
) -> usize {
    results
        .iter()
        .filter(|r| r.is_ok())
        .filter(|r| store.mark_viewed(&r.location, at))
        .count()
}
