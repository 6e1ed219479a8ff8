//! Weather provider seam and the Open-Meteo implementation.
//!
//! Providers return raw payloads; checking them is the orchestrator's job.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use skycast_core::{ProviderConfig, ProviderError, ReqwestErrorExt, Units};

use crate::types::{
    ForecastDayPayload, ForecastPayload, Location, LocationQuery, ObservationPayload, Temperature,
    TemperatureUnit, WeatherCondition, Wind,
};

const USER_AGENT: &str = concat!("SkyCast/", env!("CARGO_PKG_VERSION"));
const KELVIN_OFFSET: f64 = 273.15;

/// An external weather data source.
///
/// Transient failures must be reported as `ProviderError::Timeout` or
/// `ProviderError::Connection`; anything else is treated as fatal.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current_weather(
        &self,
        query: &LocationQuery,
        units: Units,
    ) -> Result<ObservationPayload, ProviderError>;

    async fn forecast(
        &self,
        query: &LocationQuery,
        days: u32,
        units: Units,
    ) -> Result<ForecastPayload, ProviderError>;

    async fn search_locations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Location>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    #[serde(default)]
    country: Option<String>,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: Option<CurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: Option<String>,
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    surface_pressure: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    weather_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m_dominant: Vec<Option<f64>>,
}

fn at<T: Copy>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).copied().flatten()
}

/// Open-Meteo client (no API key required).
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Client,
    forecast_url: String,
    geocoding_url: String,
}

impl OpenMeteoProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| e.into_provider_error())?;

        Ok(Self {
            client,
            forecast_url: config.forecast_url.trim_end_matches('/').to_string(),
            geocoding_url: config.geocoding_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| e.into_provider_error())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Open-Meteo returned status {}: {}", status, body);
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        response.json::<T>().await.map_err(|e| e.into_provider_error())
    }

    async fn resolve(&self, query: &LocationQuery) -> Result<Location, ProviderError> {
        match query {
            LocationQuery::Resolved(location) => Ok(location.clone()),
            LocationQuery::City(name) => self
                .search_locations(name, 1)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::NotFound(name.clone())),
        }
    }

    fn unit_params(units: Units) -> [(&'static str, String); 2] {
        let (temperature, wind) = match units {
            Units::Metric => ("celsius", "kmh"),
            Units::Imperial => ("fahrenheit", "mph"),
            // Kelvin is derived from Celsius locally
            Units::Standard => ("celsius", "ms"),
        };
        [
            ("temperature_unit", temperature.to_string()),
            ("wind_speed_unit", wind.to_string()),
        ]
    }

    fn convert(value: f64, units: Units) -> f64 {
        match units {
            Units::Standard => value + KELVIN_OFFSET,
            _ => value,
        }
    }

    fn coordinate_params(location: &Location) -> [(&'static str, String); 2] {
        [
            ("latitude", location.latitude().to_string()),
            ("longitude", location.longitude().to_string()),
        ]
    }
}

#[async_trait]
impl WeatherApi for OpenMeteoProvider {
    async fn current_weather(
        &self,
        query: &LocationQuery,
        units: Units,
    ) -> Result<ObservationPayload, ProviderError> {
        let location = self.resolve(query).await?;

        let mut params = Vec::with_capacity(7);
        params.extend(Self::coordinate_params(&location));
        params.extend(Self::unit_params(units));
        params.push((
            "current",
            "temperature_2m,apparent_temperature,relative_humidity_2m,surface_pressure,\
             wind_speed_10m,wind_direction_10m,weather_code"
                .to_string(),
        ));
        params.push(("timezone", "GMT".to_string()));

        let url = format!("{}/v1/forecast", self.forecast_url);
        let body: CurrentResponse = self.get_json(&url, &params).await?;
        let current = body
            .current
            .ok_or_else(|| ProviderError::InvalidResponse("missing 'current' block".into()))?;

        let observed_at = current
            .time
            .as_deref()
            .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M").ok())
            .map(|t| t.and_utc());

        Ok(ObservationPayload {
            location: Some(location),
            temperature: current.temperature_2m.map(|value| Temperature {
                value: Self::convert(value, units),
                unit: TemperatureUnit::for_units(units),
                feels_like: current.apparent_temperature.map(|v| Self::convert(v, units)),
            }),
            condition: current.weather_code.and_then(WeatherCondition::from_wmo_code),
            humidity: current.relative_humidity_2m,
            pressure_hpa: current.surface_pressure,
            wind: current.wind_speed_10m.map(|speed| Wind {
                speed,
                direction_degrees: current.wind_direction_10m.map(|d| d.rem_euclid(360.0) as u16),
            }),
            observed_at,
        })
    }

    async fn forecast(
        &self,
        query: &LocationQuery,
        days: u32,
        units: Units,
    ) -> Result<ForecastPayload, ProviderError> {
        let location = self.resolve(query).await?;

        let mut params = Vec::with_capacity(8);
        params.extend(Self::coordinate_params(&location));
        params.extend(Self::unit_params(units));
        params.push((
            "daily",
            "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,\
             precipitation_probability_max,wind_speed_10m_max,wind_direction_10m_dominant"
                .to_string(),
        ));
        params.push(("forecast_days", days.to_string()));
        params.push(("timezone", "auto".to_string()));

        let url = format!("{}/v1/forecast", self.forecast_url);
        let body: DailyResponse = self.get_json(&url, &params).await?;
        let daily = body
            .daily
            .ok_or_else(|| ProviderError::InvalidResponse("missing 'daily' block".into()))?;

        let mut forecast_days = Vec::with_capacity(daily.time.len());
        for (i, date) in daily.time.iter().enumerate() {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
                ProviderError::InvalidResponse(format!("bad forecast date '{}': {}", date, e))
            })?;
            forecast_days.push(ForecastDayPayload {
                date,
                high: at(&daily.temperature_2m_max, i).map(|v| Self::convert(v, units)),
                low: at(&daily.temperature_2m_min, i).map(|v| Self::convert(v, units)),
                condition: at(&daily.weather_code, i).and_then(WeatherCondition::from_wmo_code),
                wind: at(&daily.wind_speed_10m_max, i).map(|speed| Wind {
                    speed,
                    direction_degrees: at(&daily.wind_direction_10m_dominant, i)
                        .map(|d| d.rem_euclid(360.0) as u16),
                }),
                precipitation_mm: at(&daily.precipitation_sum, i),
                precipitation_chance: at(&daily.precipitation_probability_max, i)
                    .map(|p| p.clamp(0.0, 100.0) as u8),
            });
        }

        Ok(ForecastPayload {
            location: Some(location),
            unit: TemperatureUnit::for_units(units),
            days: forecast_days,
        })
    }

    async fn search_locations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Location>, ProviderError> {
        let url = format!("{}/v1/search", self.geocoding_url);
        let params = [
            ("name", query.to_string()),
            ("count", limit.to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        let body: GeocodingResponse = self.get_json(&url, &params).await?;

        let locations = body
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Location::new(r.name, r.country.unwrap_or_default(), r.latitude, r.longitude)
                    .map_err(|e| tracing::debug!("Skipping geocoding result: {}", e))
                    .ok()
            })
            .take(limit)
            .collect();

        Ok(locations)
    }
}
