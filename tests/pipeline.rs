use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weatherdash::cache::{FreshnessPolicy, MemoryStore};
use weatherdash::presentation::{from_csv, to_csv};
use weatherdash::{
    AppConfig, CacheKey, Location, Mode, OpenMeteoClient, Variable, WeatherCache, WeatherError,
    WeatherService, WeatherSource,
};

fn config_for(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.weather.base_url = server.uri();
    config.weather.archive_url = server.uri();
    config.weather.geocoding_url = server.uri();
    config.weather.timeout_seconds = 5;
    config
}

fn service_for(
    server: &MockServer,
    cache: WeatherCache<MemoryStore>,
) -> WeatherService<OpenMeteoClient, MemoryStore> {
    let config = config_for(server);
    let client = OpenMeteoClient::new(config.weather.clone()).unwrap();
    WeatherService::new(client, cache, config)
}

fn empty_cache() -> WeatherCache<MemoryStore> {
    WeatherCache::new(MemoryStore::new(), FreshnessPolicy::default())
}

fn danang() -> Location {
    Location::new(16.0471, 108.2068, "Đà Nẵng")
}

fn daily_body() -> serde_json::Value {
    json!({
        "latitude": 16.0,
        "longitude": 108.25,
        "daily_units": {
            "time": "iso8601",
            "temperature_2m_max": "°C",
            "temperature_2m_min": "°C",
            "precipitation_sum": "mm",
            "wind_speed_10m_max": "km/h"
        },
        "daily": {
            "time": ["2024-06-01", "2024-06-02", "2024-06-03"],
            "temperature_2m_max": [36.2, 33.0, null],
            "temperature_2m_min": [26.1, 25.4, 24.9],
            "precipitation_sum": [0.0, 55.5, 3.2],
            "wind_speed_10m_max": [14.4, 41.0, 9.7]
        }
    })
}

#[tokio::test]
async fn test_forecast_has_requested_days_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("forecast_days", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_body()))
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let series = service.forecast(&danang(), Some(3)).await.unwrap();

    assert_eq!(series.records.len(), 3);
    assert!(!series.stale);
    assert!(
        series
            .records
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    );
    assert_eq!(series.records[2].get(Variable::TemperatureMax), None);
    assert!(series.records[2].is_missing(Variable::TemperatureMax));
    assert_eq!(series.records[1].get(Variable::Precipitation), Some(55.5));
}

#[tokio::test]
async fn test_oversized_forecast_request_asks_for_sixteen_days() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("forecast_days", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_body()))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let series = service.forecast(&danang(), Some(300)).await.unwrap();

    assert_eq!(series.records.len(), 3);
}

#[tokio::test]
async fn test_local_current_time_is_stored_as_utc() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("forecast_days", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "latitude": 16.0,
            "longitude": 108.25,
            "timezone": "Asia/Bangkok",
            "utc_offset_seconds": 25200,
            "current_units": {"time": "iso8601", "temperature_2m": "°C"},
            "current": {"time": "2024-06-01T19:00", "interval": 900, "temperature_2m": 29.5}
        })))
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let series = service.current(&danang()).await.unwrap();

    assert_eq!(
        series.records[0].timestamp,
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    );
    assert_eq!(series.records[0].get(Variable::Temperature), Some(29.5));
}

#[tokio::test]
async fn test_repeated_request_hits_the_network_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_body()))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let first = service.forecast(&danang(), Some(3)).await.unwrap();
    let second = service.forecast(&danang(), Some(3)).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_stale_entry_is_served_when_upstream_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let location = danang();
    let cached = vec![
        weatherdash::WeatherRecord::new(Utc::now() - Duration::days(1), location.clone())
            .with(Variable::TemperatureMax, Some(30.0)),
    ];
    let fetched_at = Utc::now() - Duration::hours(4);
    let cache = empty_cache();
    cache
        .put_at(&CacheKey::new(&location, Mode::forecast(3)), cached.clone(), fetched_at)
        .await
        .unwrap();

    let service = service_for(&server, cache);
    let series = service.forecast(&location, Some(3)).await.unwrap();

    assert!(series.stale);
    assert_eq!(series.records, cached);
    assert_eq!(series.fetched_at, fetched_at);
}

#[tokio::test]
async fn test_upstream_failure_without_cache_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let err = service.forecast(&danang(), Some(3)).await.unwrap_err();

    assert!(matches!(err, WeatherError::Api { .. }));
}

#[tokio::test]
async fn test_rate_limit_is_reported_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = OpenMeteoClient::new(config_for(&server).weather).unwrap();
    let err = client.fetch_forecast(&danang(), 3).await.unwrap_err();

    match err {
        WeatherError::RateLimit {
            retry_after_secs, ..
        } => assert_eq!(retry_after_secs, Some(30)),
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_coordinates_are_an_invalid_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": true,
            "reason": "Latitude must be in range of -90 to 90°. Given: 91.0."
        })))
        .mount(&server)
        .await;

    let client = OpenMeteoClient::new(config_for(&server).weather).unwrap();
    let err = client
        .fetch_raw(&danang(), Mode::Current)
        .await
        .unwrap_err();

    assert!(matches!(err, WeatherError::InvalidLocation { .. }));
}

#[tokio::test]
async fn test_unknown_place_name_is_an_invalid_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("name", "Atlantis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generationtime_ms": 0.4})))
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let err = service.resolve(Some("Atlantis")).await.unwrap_err();

    assert!(matches!(err, WeatherError::InvalidLocation { .. }));
}

#[tokio::test]
async fn test_geocoded_place_feeds_the_forecast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "name": "Nha Trang",
                "latitude": 12.24507,
                "longitude": 109.19432,
                "country": "Vietnam",
                "admin1": "Khánh Hòa"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .and(query_param("latitude", "12.24507"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_body()))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let location = service.resolve(Some("Nha Trang")).await.unwrap();
    let series = service.forecast(&location, Some(3)).await.unwrap();

    assert_eq!(location.name, "Nha Trang, Khánh Hòa");
    assert_eq!(series.records[0].location, location);
}

#[tokio::test]
async fn test_history_comes_from_the_archive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/archive"))
        .and(query_param("start_date", "2024-06-01"))
        .and(query_param("end_date", "2024-06-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_body()))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let series = service
        .historical(&danang(), Some(start), Some(end))
        .await
        .unwrap();

    assert_eq!(series.records.len(), 3);
    let alerts = service.alerts(&series.records);
    // heat on day one, rain and wind on day two
    assert_eq!(alerts.len(), 3);
}

#[tokio::test]
async fn test_fetched_series_survives_csv_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(daily_body()))
        .mount(&server)
        .await;

    let service = service_for(&server, empty_cache());
    let series = service.forecast(&danang(), Some(3)).await.unwrap();

    let text = to_csv(&series.records).unwrap();
    let parsed = from_csv(&text).unwrap();

    assert_eq!(parsed, series.records);
}
