//! Open-Meteo forecast client.
//!
//! Fetches hourly weather (including per-layer cloud cover) and daily
//! sunrise/sunset. Fetchers return the raw JSON body; pure extraction
//! functions turn cached or fresh JSON into normalized records, so the
//! cache layer can store one opaque payload per location.
//!
//! See: https://open-meteo.com/en/docs

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Location, RawHourRecord, SunTimes};
use crate::services::normalize::{clamp_percent, compass_from_degrees};

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Source name used in error taxonomy and logs.
pub const SOURCE_NAME: &str = "open-meteo";

const HOURLY_FIELDS: &str = "cloud_cover,cloud_cover_low,cloud_cover_mid,cloud_cover_high,\
temperature_2m,relative_humidity_2m,wind_speed_10m,wind_direction_10m,precipitation_probability";

/// How many days of hourly data to request (today + 3).
const FORECAST_DAYS: u8 = 4;

/// Client for the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl OpenMeteoClient {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Self {
        Self::with_base_url(user_agent, timeout_secs, OPEN_METEO_URL)
    }

    /// Same client against a different base URL (tests point this at a
    /// local mock server).
    pub fn with_base_url(user_agent: &str, timeout_secs: u64, base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
            timeout_secs,
        }
    }

    /// Fetch the raw hourly forecast JSON for a location.
    pub async fn fetch_hourly(&self, location: Location) -> Result<serde_json::Value, AppError> {
        let url = format!(
            "{}?latitude={:.4}&longitude={:.4}&hourly={}&forecast_days={}&timezone=UTC",
            self.base_url, location.latitude, location.longitude, HOURLY_FIELDS, FORECAST_DAYS
        );
        self.get_json(&url).await
    }

    /// Fetch the raw daily sunrise/sunset JSON for a location. Issued after
    /// the hourly join; its failure degrades gracefully upstream.
    pub async fn fetch_sun_times(&self, location: Location) -> Result<serde_json::Value, AppError> {
        let url = format!(
            "{}?latitude={:.4}&longitude={:.4}&daily=sunrise,sunset&forecast_days={}&timezone=UTC",
            self.base_url, location.latitude, location.longitude, FORECAST_DAYS
        );
        self.get_json(&url).await
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(SOURCE_NAME, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream {
                source_name: SOURCE_NAME,
                message: format!("HTTP {}", response.status()),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::from_reqwest(SOURCE_NAME, self.timeout_secs, e))
    }
}

// --- Open-Meteo JSON response shapes ---

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    hourly: HourlyBlock,
}

/// Column-oriented hourly arrays; every array is index-aligned with `time`.
#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover_low: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover_mid: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover_high: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    sunrise: Vec<String>,
    sunset: Vec<String>,
}

/// Parse an Open-Meteo local-ISO timestamp ("2026-01-24T23:00") as UTC.
/// Requests always pass `timezone=UTC`, so the naive time is UTC.
fn parse_time_utc(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

fn at(column: &[Option<f64>], idx: usize) -> Option<f64> {
    column.get(idx).copied().flatten()
}

/// Extract normalized hourly records from a raw hourly response.
///
/// Pure function (no I/O). Missing values default here, once: the score
/// engine downstream assumes fully-populated records. The cloud mean comes
/// from the total-cover column; min/max come from the per-layer columns and
/// feed the synthetic uncertainty proxy.
pub fn extract_hour_records(raw: &serde_json::Value) -> Result<Vec<RawHourRecord>, AppError> {
    let response: HourlyResponse = serde_json::from_value(raw.clone()).map_err(|e| {
        AppError::Upstream {
            source_name: SOURCE_NAME,
            message: format!("response structure error: {e}"),
        }
    })?;

    let hourly = &response.hourly;
    if hourly.time.is_empty() {
        return Err(AppError::Upstream {
            source_name: SOURCE_NAME,
            message: "empty hourly series".to_string(),
        });
    }

    let mut records = Vec::with_capacity(hourly.time.len());
    for (i, raw_time) in hourly.time.iter().enumerate() {
        let Some(time) = parse_time_utc(raw_time) else {
            tracing::warn!("Skipping hour with unparseable time '{}'", raw_time);
            continue;
        };

        let cloud_cover = clamp_percent(at(&hourly.cloud_cover, i).unwrap_or(50.0));
        let layers = [
            at(&hourly.cloud_cover_low, i),
            at(&hourly.cloud_cover_mid, i),
            at(&hourly.cloud_cover_high, i),
        ];
        let known: Vec<f64> = layers.iter().flatten().map(|&v| clamp_percent(v)).collect();
        // No layer data → zero spread, i.e. no synthetic uncertainty signal.
        let cloud_min = known.iter().copied().fold(f64::INFINITY, f64::min);
        let cloud_max = known.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (cloud_min, cloud_max) = if known.is_empty() {
            (cloud_cover, cloud_cover)
        } else {
            (cloud_min, cloud_max)
        };

        records.push(RawHourRecord {
            time,
            cloud_cover,
            cloud_cover_min: cloud_min,
            cloud_cover_max: cloud_max,
            temperature_c: at(&hourly.temperature_2m, i).unwrap_or(0.0),
            humidity_pct: clamp_percent(at(&hourly.relative_humidity_2m, i).unwrap_or(50.0)),
            wind_speed_kmh: at(&hourly.wind_speed_10m, i).unwrap_or(0.0),
            wind_direction: compass_from_degrees(at(&hourly.wind_direction_10m, i).unwrap_or(0.0)),
            precipitation_probability_pct: clamp_percent(
                at(&hourly.precipitation_probability, i).unwrap_or(0.0),
            ),
        });
    }

    Ok(records)
}

/// Extract per-day sunrise/sunset from a raw daily response. Days with
/// unparseable times are skipped, not fatal.
pub fn extract_sun_times(
    raw: &serde_json::Value,
) -> Result<Vec<(NaiveDate, SunTimes)>, AppError> {
    let response: DailyResponse = serde_json::from_value(raw.clone()).map_err(|e| {
        AppError::Upstream {
            source_name: SOURCE_NAME,
            message: format!("response structure error: {e}"),
        }
    })?;

    let daily = response.daily;
    let mut out = Vec::with_capacity(daily.time.len());
    for (i, raw_date) in daily.time.iter().enumerate() {
        let date = match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => continue,
        };
        let sunrise = daily.sunrise.get(i).and_then(|s| parse_time_utc(s));
        let sunset = daily.sunset.get(i).and_then(|s| parse_time_utc(s));
        if let (Some(sunrise), Some(sunset)) = (sunrise, sunset) {
            out.push((date, SunTimes { sunrise, sunset }));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompassPoint;

    fn sample_hourly() -> serde_json::Value {
        serde_json::json!({
            "latitude": 47.37,
            "longitude": 8.54,
            "hourly": {
                "time": ["2026-01-24T22:00", "2026-01-24T23:00"],
                "cloud_cover": [20.0, null],
                "cloud_cover_low": [10.0, 30.0],
                "cloud_cover_mid": [25.0, 60.0],
                "cloud_cover_high": [80.0, 90.0],
                "temperature_2m": [-1.5, -2.0],
                "relative_humidity_2m": [65.0, 70.0],
                "wind_speed_10m": [8.0, 12.0],
                "wind_direction_10m": [270.0, 95.0],
                "precipitation_probability": [5.0, null]
            }
        })
    }

    #[test]
    fn test_extract_hour_records() {
        let records = extract_hour_records(&sample_hourly()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(
            first.time,
            "2026-01-24T22:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(first.cloud_cover, 20.0);
        assert_eq!(first.cloud_cover_min, 10.0);
        assert_eq!(first.cloud_cover_max, 80.0);
        assert_eq!(first.cloud_spread(), 70.0);
        assert_eq!(first.wind_direction, CompassPoint::W);

        // Missing values default once, at extraction
        let second = &records[1];
        assert_eq!(second.cloud_cover, 50.0);
        assert_eq!(second.precipitation_probability_pct, 0.0);
        assert_eq!(second.wind_direction, CompassPoint::E);
    }

    #[test]
    fn test_extract_empty_series_is_error() {
        let raw = serde_json::json!({"hourly": {"time": []}});
        assert!(extract_hour_records(&raw).is_err());
    }

    #[test]
    fn test_extract_malformed_structure_is_error() {
        let raw = serde_json::json!({"unexpected": true});
        let err = extract_hour_records(&raw).unwrap_err();
        assert!(err.to_string().contains("open-meteo"));
    }

    #[test]
    fn test_extract_sun_times() {
        let raw = serde_json::json!({
            "daily": {
                "time": ["2026-01-24", "2026-01-25"],
                "sunrise": ["2026-01-24T07:12", "2026-01-25T07:11"],
                "sunset": ["2026-01-24T16:58", "2026-01-25T17:00"]
            }
        });
        let days = extract_sun_times(&raw).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].0, NaiveDate::from_ymd_opt(2026, 1, 24).unwrap());
        assert_eq!(
            days[0].1.sunset,
            "2026-01-24T16:58:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_sun_times_skips_unparseable_days() {
        let raw = serde_json::json!({
            "daily": {
                "time": ["not-a-date", "2026-01-25"],
                "sunrise": ["x", "2026-01-25T07:11"],
                "sunset": ["y", "2026-01-25T17:00"]
            }
        });
        let days = extract_sun_times(&raw).unwrap();
        assert_eq!(days.len(), 1);
    }
}
