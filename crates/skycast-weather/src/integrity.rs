//! Semantic checks on provider payloads.
//!
//! A payload that fails here is discarded: it is not cached, not recorded
//! in history, and the operation reports `WeatherError::DataIntegrity`.

use chrono::Utc;

use skycast_core::WeatherError;

use crate::types::{
    Forecast, ForecastDay, ForecastPayload, Observation, ObservationPayload,
};
use crate::validation::MAX_FORECAST_DAYS;

/// Plausible surface temperature range, in degrees Celsius.
pub const MIN_TEMPERATURE_C: f64 = -100.0;
pub const MAX_TEMPERATURE_C: f64 = 70.0;

pub fn is_valid_observation(payload: &ObservationPayload) -> bool {
    check_observation(payload).is_ok()
}

pub fn is_valid_forecast(payload: &ForecastPayload) -> bool {
    check_forecast(payload).is_ok()
}

fn check_observation(payload: &ObservationPayload) -> Result<(), String> {
    if payload.location.is_none() {
        return Err("observation has no location".into());
    }

    let temperature = payload
        .temperature
        .as_ref()
        .ok_or("observation has no temperature")?;
    let celsius = temperature.celsius();
    if !(MIN_TEMPERATURE_C..=MAX_TEMPERATURE_C).contains(&celsius) {
        return Err(format!(
            "temperature {}{} is outside the plausible range",
            temperature.value,
            temperature.unit.symbol()
        ));
    }

    if let Some(humidity) = payload.humidity {
        if !(0.0..=100.0).contains(&humidity) {
            return Err(format!("humidity {} is outside [0, 100]", humidity));
        }
    }

    if payload.condition.is_none() {
        return Err("observation has no condition".into());
    }

    Ok(())
}

fn check_forecast(payload: &ForecastPayload) -> Result<(), String> {
    if payload.location.is_none() {
        return Err("forecast has no location".into());
    }
    if payload.days.is_empty() {
        return Err("forecast has no days".into());
    }
    if payload.days.len() > MAX_FORECAST_DAYS as usize {
        return Err(format!("forecast has {} days", payload.days.len()));
    }

    for day in &payload.days {
        let (Some(high), Some(low)) = (day.high, day.low) else {
            return Err(format!("forecast for {} is missing high or low", day.date));
        };
        if high < low {
            return Err(format!(
                "forecast for {} has high {} below low {}",
                day.date, high, low
            ));
        }
    }

    Ok(())
}

/// Turn a provider payload into an [`Observation`].
///
/// # Errors
/// Returns `WeatherError::DataIntegrity` naming the first failed check.
pub fn validate_observation(payload: ObservationPayload) -> Result<Observation, WeatherError> {
    if let Err(reason) = check_observation(&payload) {
        tracing::warn!("Discarding observation payload: {}", reason);
        return Err(WeatherError::data_integrity(reason));
    }

    match payload {
        ObservationPayload {
            location: Some(location),
            temperature: Some(temperature),
            condition: Some(condition),
            humidity,
            pressure_hpa,
            wind,
            observed_at,
        } => Ok(Observation {
            location,
            temperature,
            condition,
            humidity,
            pressure_hpa,
            wind,
            observed_at: observed_at.unwrap_or_else(Utc::now),
        }),
        _ => Err(WeatherError::data_integrity("observation is incomplete")),
    }
}

/// Turn a provider payload into a [`Forecast`], sorted by date.
///
/// # Errors
/// Returns `WeatherError::DataIntegrity` naming the first failed check.
pub fn validate_forecast(payload: ForecastPayload) -> Result<Forecast, WeatherError> {
    if let Err(reason) = check_forecast(&payload) {
        tracing::warn!("Discarding forecast payload: {}", reason);
        return Err(WeatherError::data_integrity(reason));
    }

    let ForecastPayload {
        location,
        unit,
        days,
    } = payload;
    let location = location.ok_or_else(|| WeatherError::data_integrity("forecast has no location"))?;

    let mut validated = Vec::with_capacity(days.len());
    for day in days {
        let (Some(high), Some(low)) = (day.high, day.low) else {
            return Err(WeatherError::data_integrity("forecast day is incomplete"));
        };
        validated.push(ForecastDay {
            date: day.date,
            high,
            low,
            condition: day.condition,
            wind: day.wind,
            precipitation_mm: day.precipitation_mm,
            precipitation_chance: day.precipitation_chance,
        });
    }
    validated.sort_by_key(|d| d.date);

    Ok(Forecast {
        location,
        unit,
        days: validated,
    })
}
