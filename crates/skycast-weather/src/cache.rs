//! Cache-aside storage for provider results.
//!
//! Keys are `namespace:arg1:arg2...` with arguments in call order.
//! Only successful, validated results are ever written.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use skycast_core::CacheConfig;

pub const WEATHER_NAMESPACE: &str = "weather";
pub const FORECAST_NAMESPACE: &str = "forecast";
pub const LOCATION_SEARCH_NAMESPACE: &str = "location_search";

/// Key/value store with per-record expiry.
///
/// Implementations must be safe to share between tasks.
pub trait CacheBackend: Send + Sync {
    /// Returns the value if present and unexpired.
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value, replacing any previous one under the same key.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> bool;

    fn remove(&self, key: &str) -> bool;

    fn clear(&self);
}

#[derive(Debug, Clone)]
struct CacheRecord {
    value: Value,
    expires_at: Instant,
}

/// Process-local cache backend.
#[derive(Debug, Default)]
pub struct MemoryCache {
    records: Mutex<HashMap<String, CacheRecord>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Time left before the record under `key` expires.
    pub fn expires_in(&self, key: &str) -> Option<Duration> {
        let records = self.records.lock();
        let record = records.get(key)?;
        record.expires_at.checked_duration_since(Instant::now())
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut records = self.records.lock();
        match records.get(key) {
            Some(record) if Instant::now() < record.expires_at => Some(record.value.clone()),
            Some(_) => {
                tracing::debug!("Cache record expired: {}", key);
                records.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            tracing::warn!("TTL overflow for cache key {}", key);
            return false;
        };
        self.records
            .lock()
            .insert(key.to_string(), CacheRecord { value, expires_at });
        true
    }

    fn remove(&self, key: &str) -> bool {
        self.records.lock().remove(key).is_some()
    }

    fn clear(&self) {
        self.records.lock().clear();
    }
}

/// Lifetimes of the namespaces the orchestrator knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtls {
    pub weather: Duration,
    pub forecast: Duration,
    pub location_search: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            weather: Duration::from_secs(300),
            forecast: Duration::from_secs(600),
            location_search: Duration::from_secs(3600),
        }
    }
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            weather: Duration::from_secs(config.weather_ttl_secs),
            forecast: Duration::from_secs(config.forecast_ttl_secs),
            location_search: Duration::from_secs(config.location_search_ttl_secs),
        }
    }
}

impl CacheTtls {
    /// Configured TTL for a known namespace.
    pub fn for_namespace(&self, namespace: &str) -> Option<Duration> {
        match namespace {
            WEATHER_NAMESPACE => Some(self.weather),
            FORECAST_NAMESPACE => Some(self.forecast),
            LOCATION_SEARCH_NAMESPACE => Some(self.location_search),
            _ => None,
        }
    }
}

/// Build a cache key from a namespace and its arguments.
///
/// ```
/// use skycast_weather::cache::cache_key;
/// assert_eq!(cache_key("weather", &[&"London", &"metric"]), "weather:London:metric");
/// ```
pub fn cache_key(namespace: &str, args: &[&dyn Display]) -> String {
    let mut key = namespace.to_string();
    for arg in args {
        key.push(':');
        key.push_str(&arg.to_string());
    }
    key
}

/// Typed access to a [`CacheBackend`] with namespace TTLs.
#[derive(Clone)]
pub struct CacheGateway {
    backend: Arc<dyn CacheBackend>,
    ttls: CacheTtls,
}

impl CacheGateway {
    pub fn new(backend: Arc<dyn CacheBackend>, ttls: CacheTtls) -> Self {
        Self { backend, ttls }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Look up a value. A miss only means no unexpired local record.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some(value) = self.backend.get(key) else {
            tracing::debug!("Cache miss: {}", key);
            return None;
        };

        match serde_json::from_value(value) {
            Ok(v) => {
                tracing::debug!("Cache hit: {}", key);
                Some(v)
            }
            Err(e) => {
                tracing::warn!("Dropping unreadable cache record {}: {}", key, e);
                self.backend.remove(key);
                None
            }
        }
    }

    /// Store a value with an explicit TTL, overwriting any existing record.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.backend.set(key, v, ttl),
            Err(e) => {
                tracing::warn!("Failed to serialize cache value for {}: {}", key, e);
                false
            }
        }
    }

    /// Store a value under `namespace`, using its configured TTL or,
    /// for unknown namespaces, `fallback_ttl`.
    pub fn store<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        fallback_ttl: Option<Duration>,
    ) -> bool {
        match self.ttls.for_namespace(namespace).or(fallback_ttl) {
            Some(ttl) => self.set(key, value, ttl),
            None => {
                tracing::warn!("No TTL for cache namespace '{}', not caching", namespace);
                false
            }
        }
    }

    pub fn clear(&self) {
        self.backend.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> (Arc<MemoryCache>, CacheGateway) {
        let backend = Arc::new(MemoryCache::new());
        let gateway = CacheGateway::new(backend.clone(), CacheTtls::default());
        (backend, gateway)
    }

    #[test]
    fn test_cache_key_is_order_sensitive() {
        assert_eq!(cache_key("weather", &[&"London", &"metric"]), "weather:London:metric");
        assert_ne!(
            cache_key("weather", &[&"London", &"metric"]),
            cache_key("weather", &[&"metric", &"London"])
        );
        assert_eq!(cache_key("forecast", &[&"Paris", &5, &"imperial"]), "forecast:Paris:5:imperial");
        assert_eq!(cache_key("ping", &[]), "ping");
    }

    #[test]
    fn test_namespace_ttls() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.for_namespace("weather"), Some(Duration::from_secs(300)));
        assert_eq!(ttls.for_namespace("forecast"), Some(Duration::from_secs(600)));
        assert_eq!(ttls.for_namespace("location_search"), Some(Duration::from_secs(3600)));
        assert_eq!(ttls.for_namespace("radar"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_uses_namespace_ttl() {
        let (backend, gateway) = gateway();
        assert!(gateway.store(WEATHER_NAMESPACE, "weather:Oslo:metric", &1, None));
        assert_eq!(backend.expires_in("weather:Oslo:metric"), Some(Duration::from_secs(300)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_namespace_needs_caller_ttl() {
        let (backend, gateway) = gateway();
        assert!(!gateway.store("radar", "radar:Oslo", &1, None));
        assert!(gateway.store("radar", "radar:Oslo", &1, Some(Duration::from_secs(30))));
        assert_eq!(backend.expires_in("radar:Oslo"), Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expires() {
        let (_, gateway) = gateway();
        gateway.set("k", &"v".to_string(), Duration::from_secs(10));
        assert_eq!(gateway.get::<String>("k").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(gateway.get::<String>("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites() {
        let (_, gateway) = gateway();
        gateway.set("k", &vec![1, 2], Duration::from_secs(10));
        gateway.set("k", &vec![3], Duration::from_secs(10));
        assert_eq!(gateway.get::<Vec<i32>>("k"), Some(vec![3]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_record_is_a_miss() {
        let (backend, gateway) = gateway();
        gateway.set("k", &"text", Duration::from_secs(10));
        assert_eq!(gateway.get::<u32>("k"), None);
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let (backend, gateway) = gateway();
        gateway.set("a", &1, Duration::from_secs(10));
        gateway.set("b", &2, Duration::from_secs(10));
        gateway.clear();
        assert_eq!(backend.len(), 0);
    }
}
