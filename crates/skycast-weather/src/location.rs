//! Device location lookup.
//!
//! Lookups may block (OS location services, IP lookups), so the
//! orchestrator always runs them on the blocking thread pool.

use skycast_core::HomeLocation;

/// Where the device is, as reported by a location service.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePosition {
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: Option<String>,
}

/// A blocking source of the device position.
pub trait Geolocator: Send + Sync {
    /// Returns `None` when the position cannot be determined.
    fn locate(&self) -> Option<DevicePosition>;
}

/// Reports a fixed, user-configured position.
#[derive(Debug, Clone)]
pub struct FixedLocation {
    position: DevicePosition,
}

impl FixedLocation {
    pub fn new(latitude: f64, longitude: f64, city_name: impl Into<String>) -> Self {
        let city_name = city_name.into();
        Self {
            position: DevicePosition {
                latitude,
                longitude,
                city_name: (!city_name.trim().is_empty()).then_some(city_name),
            },
        }
    }
}

impl From<&HomeLocation> for FixedLocation {
    fn from(home: &HomeLocation) -> Self {
        Self::new(home.latitude, home.longitude, home.city.clone())
    }
}

impl Geolocator for FixedLocation {
    fn locate(&self) -> Option<DevicePosition> {
        Some(self.position.clone())
    }
}

/// Used when no location source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl Geolocator for NoLocation {
    fn locate(&self) -> Option<DevicePosition> {
        None
    }
}
