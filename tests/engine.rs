//! End-to-end engine tests against mock upstream servers.

use chrono::FixedOffset;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nightsight::cache::{FileStore, TieredCache};
use nightsight::config::EngineConfig;
use nightsight::models::{Location, PhotoMode};
use nightsight::services::forecast::Engine;
use nightsight::services::open_meteo::OpenMeteoClient;
use nightsight::services::seven_timer::SevenTimerClient;

fn hourly_payload() -> serde_json::Value {
    serde_json::json!({
        "latitude": 47.37,
        "longitude": 8.54,
        "hourly": {
            "time": [
                "2026-01-24T20:00", "2026-01-24T21:00", "2026-01-24T22:00",
                "2026-01-25T20:00", "2026-01-25T21:00", "2026-01-25T22:00"
            ],
            "cloud_cover": [10.0, 15.0, 20.0, 70.0, 75.0, 80.0],
            "cloud_cover_low": [5.0, 10.0, 15.0, 60.0, 70.0, 75.0],
            "cloud_cover_mid": [10.0, 15.0, 20.0, 70.0, 75.0, 80.0],
            "cloud_cover_high": [15.0, 20.0, 25.0, 80.0, 85.0, 90.0],
            "temperature_2m": [-2.0, -2.5, -3.0, 1.0, 0.5, 0.0],
            "relative_humidity_2m": [55.0, 58.0, 60.0, 82.0, 85.0, 88.0],
            "wind_speed_10m": [6.0, 7.0, 8.0, 22.0, 24.0, 26.0],
            "wind_direction_10m": [270.0, 275.0, 280.0, 90.0, 95.0, 100.0],
            "precipitation_probability": [0.0, 0.0, 5.0, 40.0, 45.0, 50.0]
        }
    })
}

fn sun_payload() -> serde_json::Value {
    serde_json::json!({
        "daily": {
            "time": ["2026-01-24", "2026-01-25"],
            "sunrise": ["2026-01-24T07:12", "2026-01-25T07:11"],
            "sunset": ["2026-01-24T16:58", "2026-01-25T17:00"]
        }
    })
}

fn astro_payload() -> serde_json::Value {
    serde_json::json!({
        "product": "astro",
        "init": "2026012418",
        "dataseries": [
            { "timepoint": 3, "cloudcover": 2, "seeing": 2, "transparency": 7,
              "lifted_index": 6.0, "rh2m": 7, "wind10m": { "direction": 270.0, "speed": 2 } },
            { "timepoint": 27, "cloudcover": 7, "seeing": 6, "transparency": 3,
              "lifted_index": -1.0, "rh2m": 13, "wind10m": { "direction": 90.0, "speed": 5 } }
        ]
    })
}

/// Mount the standard happy-path mocks: hourly + sun on the weather server,
/// astro on the seeing server.
async fn mount_happy_mocks(weather: &MockServer, seeing: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("daily", "sunrise,sunset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sun_payload()))
        .mount(weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param_is_missing("daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .mount(weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(astro_payload()))
        .mount(seeing)
        .await;
}

fn engine_against(weather: &MockServer, seeing: &MockServer, cache_dir: &std::path::Path) -> Engine {
    let config = EngineConfig {
        cache_dir: cache_dir.to_string_lossy().into_owned(),
        ..EngineConfig::default()
    };
    let cache = TieredCache::new(Box::new(FileStore::new(cache_dir, config.cache_max_entries)));
    let weather_client = OpenMeteoClient::with_base_url(&config.user_agent, 5, &weather.uri());
    let seeing_client = SevenTimerClient::with_base_url(&config.user_agent, 5, &seeing.uri());
    Engine::with_clients(
        config,
        cache,
        FixedOffset::east_opt(0).unwrap(),
        weather_client,
        seeing_client,
    )
}

fn zurich() -> Location {
    Location::new(47.3769, 8.5417)
}

#[tokio::test]
async fn test_load_forecast_end_to_end() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    mount_happy_mocks(&weather, &seeing).await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_against(&weather, &seeing, dir.path());

    let days = engine
        .load_forecast(zurich(), PhotoMode::DeepSky)
        .await
        .unwrap();

    assert_eq!(days.len(), 2);
    assert!(days[0].date < days[1].date);
    // Clear first night, overcast second: scores must reflect that
    assert!(days[0].overall > days[1].overall);
    for day in &days {
        assert!(!day.hourly_scores.is_empty());
        assert!(day.best_hour.is_some());
        for hour in &day.hourly_scores {
            assert!(hour.score_min <= hour.score && hour.score <= hour.score_max);
            assert!(hour.score_max <= 100);
        }
    }
}

#[tokio::test]
async fn test_load_conditions_end_to_end() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    mount_happy_mocks(&weather, &seeing).await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_against(&weather, &seeing, dir.path());

    let conditions = engine.load_conditions(zurich()).await.unwrap();

    // The nearest-hour join always resolves to a record from the series
    assert!((0.0..=100.0).contains(&conditions.weather.cloud_cover));
    assert!((1..=5).contains(&conditions.astro.seeing));
    assert!((0.0..=100.0).contains(&conditions.moon.illumination_pct));
}

#[tokio::test]
async fn test_second_load_is_served_from_cache() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param_is_missing("daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .expect(1)
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(astro_payload()))
        .expect(1)
        .mount(&seeing)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_against(&weather, &seeing, dir.path());

    let first = engine
        .load_forecast(zurich(), PhotoMode::General)
        .await
        .unwrap();
    let second = engine
        .load_forecast(zurich(), PhotoMode::General)
        .await
        .unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].overall, second[0].overall);
    // expect(1) on both mocks verifies no second upstream call on drop
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param_is_missing("daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .expect(2)
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(astro_payload()))
        .expect(2)
        .mount(&seeing)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_against(&weather, &seeing, dir.path());

    engine
        .load_forecast(zurich(), PhotoMode::General)
        .await
        .unwrap();
    engine.invalidate(zurich());
    engine
        .load_forecast(zurich(), PhotoMode::General)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_seeing_outage_degrades_to_defaults() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("daily", "sunrise,sunset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sun_payload()))
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param_is_missing("daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&seeing)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_against(&weather, &seeing, dir.path());

    // Forecasts still come back, scored on neutral seeing defaults
    let days = engine
        .load_forecast(zurich(), PhotoMode::General)
        .await
        .unwrap();
    assert_eq!(days.len(), 2);

    let conditions = engine.load_conditions(zurich()).await.unwrap();
    assert_eq!(conditions.astro.seeing, 3);
    assert_eq!(conditions.astro.transparency, 3);
}

#[tokio::test]
async fn test_weather_outage_is_fatal() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(astro_payload()))
        .mount(&seeing)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_against(&weather, &seeing, dir.path());

    let err = engine
        .load_forecast(zurich(), PhotoMode::General)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("open-meteo"), "got: {err}");
}

#[tokio::test]
async fn test_weather_outage_serves_stale_cache() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(astro_payload()))
        .mount(&seeing)
        .await;
    let dir = tempfile::tempdir().unwrap();

    // Seed an already-expired weather payload in the durable tier
    let seed = TieredCache::new(Box::new(FileStore::new(dir.path(), 64)));
    seed.set(
        "weather:47.3769,8.5417",
        hourly_payload(),
        chrono::Duration::zero(),
    );

    let engine = engine_against(&weather, &seeing, dir.path());
    let days = engine
        .load_forecast(zurich(), PhotoMode::General)
        .await
        .unwrap();
    assert_eq!(days.len(), 2, "stale cached weather should still produce a forecast");
}

#[tokio::test]
async fn test_sun_outage_is_not_fatal() {
    let weather = MockServer::start().await;
    let seeing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("daily", "sunrise,sunset"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param_is_missing("daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hourly_payload()))
        .mount(&weather)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(astro_payload()))
        .mount(&seeing)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_against(&weather, &seeing, dir.path());

    let conditions = engine.load_conditions(zurich()).await.unwrap();
    assert!(conditions.sun.is_none());
}
