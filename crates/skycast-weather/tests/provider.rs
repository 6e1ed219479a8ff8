//! Integration tests for OpenMeteoProvider using wiremock.

use std::time::Duration;

use skycast_core::{ProviderConfig, ProviderError, Units};
use skycast_weather::{
    LocationQuery, OpenMeteoProvider, TemperatureUnit, WeatherApi, WeatherCondition,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer, timeout_secs: u64) -> OpenMeteoProvider {
    let config = ProviderConfig {
        forecast_url: server.uri(),
        geocoding_url: server.uri(),
        timeout_secs,
    };
    OpenMeteoProvider::new(&config).unwrap()
}

fn london_search() -> serde_json::Value {
    serde_json::json!({
        "results": [{
            "name": "London",
            "country": "United Kingdom",
            "latitude": 51.50853,
            "longitude": -0.12574
        }]
    })
}

async fn mount_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "London"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_search()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_current_weather_resolves_city_then_fetches() {
    let server = MockServer::start().await;
    mount_search(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("temperature_unit", "celsius"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current": {
                "time": "2026-03-01T12:00",
                "temperature_2m": 11.4,
                "apparent_temperature": 9.8,
                "relative_humidity_2m": 71.0,
                "surface_pressure": 1009.2,
                "wind_speed_10m": 14.0,
                "wind_direction_10m": 250.0,
                "weather_code": 3
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let payload = provider
        .current_weather(&LocationQuery::City("London".into()), Units::Metric)
        .await
        .unwrap();

    let location = payload.location.unwrap();
    assert_eq!(location.name(), "London");
    assert_eq!(location.country(), "United Kingdom");

    let temperature = payload.temperature.unwrap();
    assert_eq!(temperature.value, 11.4);
    assert_eq!(temperature.unit, TemperatureUnit::Celsius);
    assert_eq!(temperature.feels_like, Some(9.8));
    assert_eq!(payload.condition, Some(WeatherCondition::Cloudy));
    assert_eq!(payload.humidity, Some(71.0));
    assert_eq!(payload.wind.unwrap().direction_degrees, Some(250));
    assert!(payload.observed_at.is_some());
}

#[tokio::test]
async fn test_standard_units_report_kelvin() {
    let server = MockServer::start().await;
    mount_search(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current": { "temperature_2m": 0.0, "weather_code": 0 }
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let payload = provider
        .current_weather(&LocationQuery::City("London".into()), Units::Standard)
        .await
        .unwrap();

    let temperature = payload.temperature.unwrap();
    assert_eq!(temperature.unit, TemperatureUnit::Kelvin);
    assert!((temperature.value - 273.15).abs() < 1e-9);
}

#[tokio::test]
async fn test_forecast_days() {
    let server = MockServer::start().await;
    mount_search(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("forecast_days", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "daily": {
                "time": ["2026-03-01", "2026-03-02"],
                "weather_code": [61, null],
                "temperature_2m_max": [12.0, 14.5],
                "temperature_2m_min": [4.0, 6.0],
                "precipitation_sum": [3.2, 0.0],
                "precipitation_probability_max": [80, 5],
                "wind_speed_10m_max": [20.0, 11.0],
                "wind_direction_10m_dominant": [200, 190]
            }
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let payload = provider
        .forecast(&LocationQuery::City("London".into()), 2, Units::Metric)
        .await
        .unwrap();

    assert_eq!(payload.days.len(), 2);
    assert_eq!(payload.days[0].high, Some(12.0));
    assert_eq!(payload.days[0].condition, Some(WeatherCondition::Rain));
    assert_eq!(payload.days[0].precipitation_chance, Some(80));
    assert_eq!(payload.days[1].condition, None);
}

#[tokio::test]
async fn test_search_with_no_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "generationtime_ms": 0.4
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let locations = provider.search_locations("Nowhere", 5).await.unwrap();
    assert!(locations.is_empty());
}

#[tokio::test]
async fn test_unknown_city_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let err = provider
        .current_weather(&LocationQuery::City("Atlantis".into()), Units::Metric)
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::NotFound("Atlantis".into()));
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let cases = [
        (401, ProviderError::Unauthorized),
        (429, ProviderError::RateLimited),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, 5);
        let err = provider.search_locations("London", 1).await.unwrap_err();
        assert_eq!(err, expected);
        assert!(!err.is_retryable());
    }
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let err = provider.search_locations("London", 1).await.unwrap_err();
    assert!(matches!(err, ProviderError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(london_search())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, 1);
    let err = provider.search_locations("London", 1).await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_refused_connection_is_retryable() {
    let config = ProviderConfig {
        forecast_url: "http://127.0.0.1:1".into(),
        geocoding_url: "http://127.0.0.1:1".into(),
        timeout_secs: 5,
    };
    let provider = OpenMeteoProvider::new(&config).unwrap();

    let err = provider.search_locations("London", 1).await.unwrap_err();
    assert!(matches!(err, ProviderError::Connection(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let err = provider.search_locations("London", 1).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}
