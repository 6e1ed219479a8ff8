use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use skycast_core::{Units, WeatherError};

use crate::validation::validate_coordinates;

/// Temperature scale a value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    pub fn for_units(units: Units) -> Self {
        match units {
            Units::Metric => Self::Celsius,
            Units::Imperial => Self::Fahrenheit,
            Units::Standard => Self::Kelvin,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Kelvin => "K",
        }
    }

    /// Convert a value in this unit to degrees Celsius.
    pub fn to_celsius(&self, value: f64) -> f64 {
        match self {
            Self::Celsius => value,
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            Self::Kelvin => value - 273.15,
        }
    }
}

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition.
    /// Returns `None` for codes outside the WMO table.
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Option<Self> {
        let condition = match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::Sleet, // Freezing drizzle
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            66 | 67 => Self::Sleet, // Freezing rain
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => return None,
        };
        Some(condition)
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A resolved place on the map.
///
/// Coordinates are checked on construction and the value cannot be changed
/// afterwards. Equality compares every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LocationRecord", into = "LocationRecord")]
pub struct Location {
    name: String,
    country: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct LocationRecord {
    name: String,
    #[serde(default)]
    country: String,
    latitude: f64,
    longitude: f64,
}

impl TryFrom<LocationRecord> for Location {
    type Error = WeatherError;

    fn try_from(record: LocationRecord) -> Result<Self, Self::Error> {
        Location::new(record.name, record.country, record.latitude, record.longitude)
    }
}

impl From<Location> for LocationRecord {
    fn from(location: Location) -> Self {
        LocationRecord {
            name: location.name,
            country: location.country,
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}

impl Location {
    /// # Errors
    /// Returns `WeatherError::Validation` when the coordinates are out of range.
    pub fn new(
        name: impl Into<String>,
        country: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, WeatherError> {
        validate_coordinates(latitude, longitude)?;
        Ok(Self {
            name: name.into(),
            country: country.into(),
            latitude,
            longitude,
        })
    }

    /// A location known only by its coordinates, labelled with them.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Result<Self, WeatherError> {
        Self::new(format!("{:.4}, {:.4}", latitude, longitude), "", latitude, longitude)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// "Name, Country", or just the name when the country is unknown.
    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }
}

/// What a provider should look up.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Free-form city name, resolved by the provider.
    City(String),
    /// Already resolved; fetched by coordinates.
    Resolved(Location),
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationQuery::City(name) => f.write_str(name),
            LocationQuery::Resolved(location) => write!(
                f,
                "{} ({:.4}, {:.4})",
                location.name(),
                location.latitude(),
                location.longitude()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: TemperatureUnit,
    pub feels_like: Option<f64>,
}

impl Temperature {
    pub fn celsius(&self) -> f64 {
        self.unit.to_celsius(self.value)
    }

    pub fn format(&self) -> String {
        format!("{:.1}{}", self.value, self.unit.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// km/h for metric, mph for imperial, m/s for standard
    pub speed: f64,
    /// Degrees clockwise from north
    pub direction_degrees: Option<u16>,
}

/// Current conditions as reported by a provider, before any checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationPayload {
    pub location: Option<Location>,
    pub temperature: Option<Temperature>,
    pub condition: Option<WeatherCondition>,
    pub humidity: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind: Option<Wind>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// One forecast day as reported by a provider, before any checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDayPayload {
    pub date: NaiveDate,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub condition: Option<WeatherCondition>,
    pub wind: Option<Wind>,
    pub precipitation_mm: Option<f64>,
    pub precipitation_chance: Option<u8>,
}

/// A daily forecast as reported by a provider, before any checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPayload {
    pub location: Option<Location>,
    pub unit: TemperatureUnit,
    pub days: Vec<ForecastDayPayload>,
}

/// Current weather that passed payload validation.
///
/// Only built by [`crate::integrity`]; a new fetch yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub(crate) location: Location,
    pub(crate) temperature: Temperature,
    pub(crate) condition: WeatherCondition,
    pub(crate) humidity: Option<f64>,
    pub(crate) pressure_hpa: Option<f64>,
    pub(crate) wind: Option<Wind>,
    pub(crate) observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn temperature(&self) -> &Temperature {
        &self.temperature
    }

    pub fn condition(&self) -> WeatherCondition {
        self.condition
    }

    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn pressure_hpa(&self) -> Option<f64> {
        self.pressure_hpa
    }

    pub fn wind(&self) -> Option<&Wind> {
        self.wind.as_ref()
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub(crate) date: NaiveDate,
    pub(crate) high: f64,
    pub(crate) low: f64,
    pub(crate) condition: Option<WeatherCondition>,
    pub(crate) wind: Option<Wind>,
    pub(crate) precipitation_mm: Option<f64>,
    pub(crate) precipitation_chance: Option<u8>,
}

impl ForecastDay {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn condition(&self) -> Option<WeatherCondition> {
        self.condition
    }

    pub fn wind(&self) -> Option<&Wind> {
        self.wind.as_ref()
    }

    pub fn precipitation_mm(&self) -> Option<f64> {
        self.precipitation_mm
    }

    pub fn precipitation_chance(&self) -> Option<u8> {
        self.precipitation_chance
    }
}

/// 1 to 16 validated days for one location, in date order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub(crate) location: Location,
    pub(crate) unit: TemperatureUnit,
    pub(crate) days: Vec<ForecastDay>,
}

impl Forecast {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn days(&self) -> &[ForecastDay] {
        &self.days
    }
}

/// A city the user pinned for quick access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteCity {
    pub location: Location,
    pub nickname: Option<String>,
    pub added_at: DateTime<Utc>,
    pub last_viewed: Option<DateTime<Utc>>,
}

impl FavoriteCity {
    pub fn new(location: Location, nickname: Option<String>) -> Self {
        Self {
            location,
            nickname: nickname.filter(|n| !n.trim().is_empty()),
            added_at: Utc::now(),
            last_viewed: None,
        }
    }

    /// Nickname if set, otherwise the location name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(self.location.name())
    }

    /// Case-insensitive match against the location name or the nickname.
    pub fn matches(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        self.location.name().to_lowercase() == needle
            || self
                .nickname
                .as_deref()
                .is_some_and(|n| n.to_lowercase() == needle)
    }
}

/// Denormalized snapshot of one successful current-weather fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub unit: TemperatureUnit,
    pub condition: WeatherCondition,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            city: observation.location.name().to_string(),
            country: observation.location.country().to_string(),
            temperature: observation.temperature.value,
            unit: observation.temperature.unit,
            condition: observation.condition,
            timestamp: Utc::now(),
        }
    }
}
