//! Input checks that run before any cache or network activity.
//!
//! Every function here is pure. A failure is reported as
//! `WeatherError::Validation` and never reaches the retry executor.

use skycast_core::WeatherError;

/// Minimum city name length, in characters, after trimming.
pub const MIN_CITY_LENGTH: usize = 2;

/// Maximum city name length, in characters, after trimming.
pub const MAX_CITY_LENGTH: usize = 100;

/// Maximum number of forecast days a provider can return.
pub const MAX_FORECAST_DAYS: u32 = 16;

fn is_city_char(c: char) -> bool {
    c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.')
}

/// Validate a city name.
///
/// # Errors
/// Returns `WeatherError::Validation` if, after trimming, the name:
/// - Is shorter than `MIN_CITY_LENGTH` or longer than `MAX_CITY_LENGTH` characters.
/// - Contains anything other than letters, spaces, hyphens, apostrophes and periods.
pub fn validate_city(name: &str) -> Result<(), WeatherError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();

    if length < MIN_CITY_LENGTH {
        return Err(WeatherError::validation(format!(
            "City name must be at least {} characters",
            MIN_CITY_LENGTH
        )));
    }

    if length > MAX_CITY_LENGTH {
        return Err(WeatherError::validation(format!(
            "City name exceeds maximum length of {} characters",
            MAX_CITY_LENGTH
        )));
    }

    if let Some(bad) = trimmed.chars().find(|c| !is_city_char(*c)) {
        return Err(WeatherError::validation(format!(
            "City name contains invalid character '{}'",
            bad
        )));
    }

    Ok(())
}

/// Normalize a city name: trim, collapse whitespace runs, title-case.
///
/// A letter is upper-cased when it follows a non-letter, so
/// `"  st. louis "` becomes `"St. Louis"` and `"o'neill"` becomes `"O'Neill"`.
pub fn clean_city(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut cleaned = String::with_capacity(collapsed.len());
    let mut previous_is_letter = false;
    for c in collapsed.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                cleaned.extend(c.to_lowercase());
            } else {
                cleaned.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            cleaned.push(c);
            previous_is_letter = false;
        }
    }
    cleaned
}

/// Validate a latitude/longitude pair.
///
/// # Errors
/// Returns `WeatherError::Validation` unless latitude is within [-90, 90]
/// and longitude within [-180, 180]. NaN is rejected.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), WeatherError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(WeatherError::validation(format!(
            "Latitude {} is outside [-90, 90]",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(WeatherError::validation(format!(
            "Longitude {} is outside [-180, 180]",
            longitude
        )));
    }
    Ok(())
}

/// Validate a requested forecast length.
///
/// # Errors
/// Returns `WeatherError::Validation` unless `1 <= days <= MAX_FORECAST_DAYS`.
pub fn validate_forecast_days(days: u32) -> Result<(), WeatherError> {
    if days == 0 || days > MAX_FORECAST_DAYS {
        return Err(WeatherError::validation(format!(
            "Forecast days must be between 1 and {}, got {}",
            MAX_FORECAST_DAYS, days
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_city_accepts_common_names() {
        for name in ["London", "  Paris  ", "São Paulo", "Winston-Salem", "St. John's", "Zürich", "東京"] {
            assert!(validate_city(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_validate_city_too_short() {
        assert!(matches!(validate_city(" a "), Err(WeatherError::Validation(_))));
        assert!(matches!(validate_city(""), Err(WeatherError::Validation(_))));
    }

    #[test]
    fn test_validate_city_length_bounds() {
        assert!(validate_city(&"a".repeat(MAX_CITY_LENGTH)).is_ok());
        assert!(validate_city(&"a".repeat(MAX_CITY_LENGTH + 1)).is_err());
        // Counted in characters, not bytes
        assert!(validate_city(&"é".repeat(MAX_CITY_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_city_rejects_symbols_and_digits() {
        for name in ["London1", "Paris;DROP", "New_York", "Berlin, DE", "<script>"] {
            assert!(validate_city(name).is_err(), "{} should be invalid", name);
        }
    }

    #[test]
    fn test_clean_city_normalizes() {
        assert_eq!(clean_city("  lonDON "), "London");
        assert_eq!(clean_city("new    YORK"), "New York");
        assert_eq!(clean_city("st. louis"), "St. Louis");
        assert_eq!(clean_city("o'neill"), "O'Neill");
        assert_eq!(clean_city("winston-salem"), "Winston-Salem");
        assert_eq!(clean_city("são\tpaulo"), "São Paulo");
    }

    #[test]
    fn test_clean_city_case_and_space_variants_agree() {
        let variants = ["new york", "NEW YORK", "  New   york ", "nEw\tYoRk"];
        let cleaned: Vec<_> = variants.iter().map(|v| clean_city(v)).collect();
        assert!(cleaned.iter().all(|c| c == "New York"));
    }

    #[test]
    fn test_clean_city_is_idempotent() {
        let once = clean_city("  rio de JANEIRO ");
        assert_eq!(clean_city(&once), once);
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.01, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.01).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_validate_forecast_days() {
        assert!(validate_forecast_days(1).is_ok());
        assert!(validate_forecast_days(16).is_ok());
        assert!(validate_forecast_days(0).is_err());
        assert!(validate_forecast_days(17).is_err());
        assert!(validate_forecast_days(20).is_err());
    }
}
