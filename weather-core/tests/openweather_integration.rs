//! Integration tests for OpenWeatherFetcher using wiremock.
//!
//! These tests verify the fetcher and the full refresh cycle against a mock
//! HTTP server.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use weather_fetcher_core::{
    Coordinator, FetchError, Fetcher, LocationKey, ManualClock, OpenWeatherFetcher, ResultCache,
    Runner, RunnerConfig, TickOutcome, WeatherReading, WeatherSink,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp")
}

/// Helper to create a current-weather body.
fn current_body(temp: f64, humidity: u8, condition: &str, wind: f64) -> serde_json::Value {
    serde_json::json!({
        "name": "London",
        "dt": 1_699_999_900,
        "main": { "temp": temp, "feels_like": temp - 1.0, "humidity": humidity },
        "weather": [ { "main": "Clear", "description": condition } ],
        "wind": { "speed": wind, "deg": 200 }
    })
}

fn fetcher_for(
    server: &MockServer,
    clock: Arc<ManualClock>,
    timeout: Duration,
) -> OpenWeatherFetcher {
    OpenWeatherFetcher::new(server.uri(), "KEY".to_string(), timeout, clock).unwrap()
}

fn london() -> LocationKey {
    LocationKey::new("London").unwrap()
}

#[tokio::test]
async fn test_fetch_current_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "london"))
        .and(query_param("appid", "KEY"))
        .and(query_param("units", "metric"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(current_body(20.0, 50, "Clear", 5.0)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));

    let reading = fetcher.fetch(&london()).await.unwrap();

    assert_eq!(reading.location, london());
    assert_eq!(reading.place_name, "London");
    assert_eq!(reading.temperature_c, 20.0);
    assert_eq!(reading.humidity_pct, 50);
    assert_eq!(reading.condition, "Clear");
    assert_eq!(reading.wind_speed_mps, 5.0);
    assert_eq!(reading.observed_at, DateTime::from_timestamp(1_699_999_900, 0));
    assert_eq!(reading.fetched_at, t0());
}

#[tokio::test]
async fn test_fetch_by_coordinates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "51.5"))
        .and(query_param("lon", "-0.12"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(current_body(11.0, 80, "light rain", 3.5)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let key = LocationKey::new("51.5,-0.12").unwrap();

    let reading = fetcher.fetch(&key).await.unwrap();
    assert_eq!(reading.condition, "light rain");
    assert_eq!(reading.location, key);
}

#[tokio::test]
async fn test_not_found_maps_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let err = fetcher.fetch(&LocationKey::new("Atlantis").unwrap()).await.unwrap_err();

    assert_eq!(err, FetchError::NotFound);
}

#[tokio::test]
async fn test_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let err = fetcher.fetch(&london()).await.unwrap_err();

    assert_eq!(err, FetchError::RateLimited);
}

#[tokio::test]
async fn test_server_error_maps_to_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let err = fetcher.fetch(&london()).await.unwrap_err();

    assert_eq!(err, FetchError::Upstream { status: 502, message: "bad gateway".into() });
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_missing_field_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "London",
            "main": { "temp": 20.0, "humidity": 50 },
            "weather": [ { "description": "Clear" } ]
        })))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let err = fetcher.fetch(&london()).await.unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_mistyped_field_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "London",
            "main": { "temp": "warm", "humidity": 50 },
            "weather": [ { "description": "Clear" } ],
            "wind": { "speed": 1.0 }
        })))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let err = fetcher.fetch(&london()).await.unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_empty_conditions_are_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "London",
            "main": { "temp": 20.0, "humidity": 50 },
            "weather": [],
            "wind": { "speed": 1.0 }
        })))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let err = fetcher.fetch(&london()).await.unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(t0()));
    let fetcher = fetcher_for(&mock_server, clock, Duration::from_secs(5));
    let err = fetcher.fetch(&london()).await.unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_response_times_out_as_network_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(current_body(20.0, 50, "Clear", 5.0))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let fetcher =
        fetcher_for(&mock_server, Arc::new(ManualClock::new(t0())), Duration::from_millis(200));
    let err = fetcher.fetch(&london()).await.unwrap_err();

    match err {
        FetchError::Network(msg) => {
            assert!(msg.contains("timed out"));
            assert!(!msg.contains("KEY"), "api key leaked into error: {msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Nothing listens on port 1.
    let fetcher = OpenWeatherFetcher::new(
        "http://127.0.0.1:1",
        "KEY".to_string(),
        Duration::from_secs(2),
        Arc::new(ManualClock::new(t0())),
    )
    .unwrap();

    let err = fetcher.fetch(&london()).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}

#[derive(Debug, Default)]
struct RecordingSink {
    readings: Vec<WeatherReading>,
    errors: Vec<(LocationKey, FetchError)>,
}

impl WeatherSink for RecordingSink {
    fn publish_reading(&mut self, reading: &WeatherReading) {
        self.readings.push(reading.clone());
    }

    fn publish_error(&mut self, location: &LocationKey, error: &FetchError) {
        self.errors.push((location.clone(), error.clone()));
    }
}

fn coordinator_against(
    rt: &tokio::runtime::Runtime,
    server: &MockServer,
    clock: Arc<ManualClock>,
) -> Coordinator<RecordingSink> {
    let fetcher = Arc::new(fetcher_for(server, clock.clone(), Duration::from_secs(5)));
    let (runner, completions) = Runner::new(rt.handle().clone(), fetcher, RunnerConfig::default());
    Coordinator::new(
        runner,
        completions,
        ResultCache::new(Duration::from_secs(600)),
        clock,
        RecordingSink::default(),
    )
}

#[test]
fn test_refresh_cycle_serves_second_tick_from_cache() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mock_server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(current_body(20.0, 50, "Clear", 5.0)),
            )
            .expect(1)
            .mount(&server)
            .await;
        server
    });

    let clock = Arc::new(ManualClock::new(t0()));
    let mut coordinator = coordinator_against(&rt, &mock_server, clock.clone());

    assert!(matches!(coordinator.tick(&london()), TickOutcome::Submitted(_)));
    assert_eq!(coordinator.wait_and_process(Duration::from_secs(10)), 1);

    clock.advance(Duration::from_secs(5));
    assert_eq!(coordinator.tick(&london()), TickOutcome::CacheHit);

    let readings = &coordinator.sink().readings;
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0], readings[1]);
    assert_eq!(readings[0].temperature_c, 20.0);

    let entry = coordinator.cache().entry(&london()).unwrap();
    assert_eq!(entry.expires_at(), t0() + chrono::Duration::seconds(600));

    // `expect(1)` is verified when the server drops; do it inside the runtime.
    rt.block_on(async move { drop(mock_server) });
}

#[test]
fn test_unknown_location_is_surfaced_and_not_cached() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mock_server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    });

    let mut coordinator =
        coordinator_against(&rt, &mock_server, Arc::new(ManualClock::new(t0())));
    let atlantis = LocationKey::new("Atlantis").unwrap();

    coordinator.tick(&atlantis);
    assert_eq!(coordinator.wait_and_process(Duration::from_secs(10)), 1);

    assert_eq!(coordinator.sink().errors, vec![(atlantis.clone(), FetchError::NotFound)]);
    assert!(coordinator.sink().readings.is_empty());
    assert!(coordinator.cache().is_empty());
}
