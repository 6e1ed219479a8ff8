//! Centralized error types for SkyCast.
//!
//! This module provides a typed error hierarchy that:
//! - Lets callers branch on the failure kind instead of on absent values
//! - Provides user-friendly messages suitable for UI display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Weather(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Errors raised by a weather provider collaborator.
///
/// Only transport-level failures (`Timeout`, `Connection`) are retryable.
/// Everything else, including rate limiting and server errors, is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Unauthorized - API key may be invalid")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }

    /// Map a non-success HTTP status onto a provider error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound(message),
            429 => Self::RateLimited,
            _ => Self::Api { status, message },
        }
    }
}

/// Discriminant of [`WeatherError`], for callers that only need the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherErrorKind {
    Validation,
    ProviderTransient,
    ProviderFatal,
    DataIntegrity,
    LocationNotFound,
    LocationUnavailable,
    Storage,
    Cancelled,
}

/// Failures surfaced by the weather orchestrator.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Malformed input, rejected before any cache or network activity.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Transient provider failure that persisted through every retry.
    #[error("Provider unavailable after {attempts} attempts: {source}")]
    ProviderTransient {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Provider failure that retrying cannot fix.
    #[error("Provider error: {0}")]
    ProviderFatal(#[source] ProviderError),

    /// The provider answered, but the payload failed semantic checks.
    #[error("Invalid weather data: {0}")]
    DataIntegrity(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Current location unavailable")]
    LocationUnavailable,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl WeatherError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a data integrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }

    pub fn kind(&self) -> WeatherErrorKind {
        match self {
            Self::Validation(_) => WeatherErrorKind::Validation,
            Self::ProviderTransient { .. } => WeatherErrorKind::ProviderTransient,
            Self::ProviderFatal(_) => WeatherErrorKind::ProviderFatal,
            Self::DataIntegrity(_) => WeatherErrorKind::DataIntegrity,
            Self::LocationNotFound(_) => WeatherErrorKind::LocationNotFound,
            Self::LocationUnavailable => WeatherErrorKind::LocationUnavailable,
            Self::Storage(_) => WeatherErrorKind::Storage,
            Self::Cancelled => WeatherErrorKind::Cancelled,
        }
    }

    /// Whether the UI may reasonably offer a "try again" action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderTransient { .. } | Self::Storage(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::Validation(_) => "Please check the city name or settings and try again.",
            WeatherError::ProviderTransient { .. } => {
                "Weather service unavailable. Please try again later."
            }
            WeatherError::ProviderFatal(ProviderError::Unauthorized) => {
                "Weather API key is invalid. Check settings."
            }
            WeatherError::ProviderFatal(ProviderError::RateLimited) => {
                "Too many weather requests. Please wait a moment."
            }
            WeatherError::ProviderFatal(ProviderError::NotFound(_)) => {
                "Location not found. Check and try again."
            }
            WeatherError::ProviderFatal(_) => "Weather service error. Please try again.",
            WeatherError::DataIntegrity(_) => "Received invalid weather data. Please try again.",
            WeatherError::LocationNotFound(_) => "Location not found. Check and try again.",
            WeatherError::LocationUnavailable => {
                "Could not determine your location. Search for a city instead."
            }
            WeatherError::Storage(_) => "Failed to save weather data locally.",
            WeatherError::Cancelled => "The request was cancelled.",
        }
    }
}

/// Persistence errors (SQLite, serialized documents).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Unavailable(_) => "Unable to access local data. Try restarting the app.",
            StorageError::QueryFailed(_) => "A data operation failed. Please try again.",
            StorageError::Corruption(_) => {
                "Local data may be corrupted. Consider resetting app data."
            }
            StorageError::Serialization(_) => "Local data could not be read or written.",
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Extension trait for classifying reqwest errors as provider errors.
pub trait ReqwestErrorExt {
    fn into_provider_error(self) -> ProviderError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_provider_error(self) -> ProviderError {
        if self.is_timeout() {
            ProviderError::Timeout(self.to_string())
        } else if self.is_connect() {
            ProviderError::Connection(self.to_string())
        } else if let Some(status) = self.status() {
            ProviderError::from_status(status.as_u16(), self.to_string())
        } else if self.is_decode() {
            ProviderError::InvalidResponse(self.to_string())
        } else {
            ProviderError::Api {
                status: 0,
                message: self.to_string(),
            }
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_storage_error(self) -> StorageError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_storage_error(self) -> StorageError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                StorageError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                StorageError::Unavailable(self.to_string())
            }
            _ => StorageError::QueryFailed(self.to_string()),
        }
    }
}
