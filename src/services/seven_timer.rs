//! 7Timer ASTRO product client.
//!
//! The seeing feed speaks in provider codes (seeing 1–8, transparency 1–8,
//! cloud buckets 1–9, humidity −4..16, wind 1–8) on its own time grid: a
//! model-initialization instant encoded as `YYYYMMDDHH` plus integer hour
//! offsets. Everything is converted to canonical units here, in one pass.
//!
//! See: http://www.7timer.info/doc.php

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Location, RawAstroRecord};
use crate::services::normalize::{
    clamp_percent, cloud_percent_from_code, compass_from_degrees, humidity_percent_from_code,
    seeing_from_code, stability_from_lifted_index, transparency_from_code,
    wind_speed_kmh_from_code,
};

const SEVEN_TIMER_URL: &str = "http://www.7timer.info/bin/astro.php";

/// Source name used in error taxonomy and logs.
pub const SOURCE_NAME: &str = "7timer";

/// Client for the 7Timer ASTRO endpoint.
#[derive(Debug, Clone)]
pub struct SevenTimerClient {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl SevenTimerClient {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Self {
        Self::with_base_url(user_agent, timeout_secs, SEVEN_TIMER_URL)
    }

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

    /// Fetch the raw astro dataseries JSON for a location.
    /// `ac=0` (no altitude correction), metric units, JSON output — fixed
    /// flags that are part of the feed contract.
    pub async fn fetch_astro(&self, location: Location) -> Result<serde_json::Value, AppError> {
        let url = format!(
            "{}?lon={:.4}&lat={:.4}&ac=0&unit=metric&output=json&tzshift=0",
            self.base_url, location.longitude, location.latitude
        );

        let response = self
            .client
            .get(&url)
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

// --- 7Timer JSON response shapes ---

#[derive(Debug, Deserialize)]
struct AstroResponse {
    /// Model initialization instant, `YYYYMMDDHH`.
    init: String,
    dataseries: Vec<AstroPoint>,
}

#[derive(Debug, Deserialize)]
struct AstroPoint {
    /// Hours offset from `init`.
    timepoint: i64,
    seeing: Option<u8>,
    transparency: Option<u8>,
    cloudcover: Option<u8>,
    lifted_index: Option<f64>,
    rh2m: Option<i8>,
    wind10m: Option<AstroWind>,
}

#[derive(Debug, Deserialize)]
struct AstroWind {
    speed: Option<u8>,
    direction: Option<f64>,
}

/// Parse the `YYYYMMDDHH` init stamp into an instant.
fn parse_init(init: &str) -> Option<DateTime<Utc>> {
    if init.len() != 10 || !init.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(&init[..8], "%Y%m%d").ok()?;
    let hour: u32 = init[8..].parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    Some(date.and_time(time).and_utc())
}

/// Extract normalized astro records from a raw response.
///
/// Pure function (no I/O); all provider codes go through the normalizer
/// tables so downstream code only ever sees canonical units.
pub fn extract_astro_records(raw: &serde_json::Value) -> Result<Vec<RawAstroRecord>, AppError> {
    let response: AstroResponse = serde_json::from_value(raw.clone()).map_err(|e| {
        AppError::Upstream {
            source_name: SOURCE_NAME,
            message: format!("response structure error: {e}"),
        }
    })?;

    let init = parse_init(&response.init).ok_or_else(|| AppError::Upstream {
        source_name: SOURCE_NAME,
        message: format!("unparseable init timestamp '{}'", response.init),
    })?;

    let records = response
        .dataseries
        .iter()
        .map(|point| {
            let wind = point.wind10m.as_ref();
            RawAstroRecord {
                time: init + chrono::Duration::hours(point.timepoint),
                seeing: seeing_from_code(point.seeing),
                transparency: transparency_from_code(point.transparency),
                cloud_cover_pct: clamp_percent(cloud_percent_from_code(point.cloudcover)),
                stability: stability_from_lifted_index(point.lifted_index),
                humidity_pct: clamp_percent(humidity_percent_from_code(point.rh2m)),
                wind_speed_kmh: wind_speed_kmh_from_code(wind.and_then(|w| w.speed)),
                wind_direction: compass_from_degrees(
                    wind.and_then(|w| w.direction).unwrap_or(0.0),
                ),
            }
        })
        .collect();

    Ok(records)
}
