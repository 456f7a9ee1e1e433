//! Forecast orchestration and day-level aggregation.
//!
//! The [`Engine`] is the core's public surface: it runs the two independent
//! feed fetches concurrently (cached, coalesced), issues the dependent
//! sun-times fetch after the join, fuses the series through the temporal
//! aligner, and hands fully-populated [`Conditions`] to the score engine.
//! [`build_forecast`] is the pure day-level aggregation underneath
//! `load_forecast`.
//!
//! Failure policy: the weather feed is critical — a failed refresh falls
//! back to a stale cached payload and only then propagates; the seeing
//! feed and the sun-times fetch degrade to documented neutral defaults.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::cache::TieredCache;
use crate::config::EngineConfig;
use crate::errors::AppError;
use crate::models::{
    CompassPoint, Conditions, DayForecast, HourlyScore, Location, MoonInfo, PhotoMode,
    RawAstroRecord, RawHourRecord, ScoreRating, Stability, SunTimes,
};
use crate::services::open_meteo::{self, OpenMeteoClient};
use crate::services::seven_timer::{self, SevenTimerClient};
use crate::services::{align, moon, score};

/// Day-level ± spread reported on every `DayForecast`. Kept as a fixed
/// value rather than an aggregate of the hourly uncertainties; see
/// DESIGN.md for the rationale.
const DAY_SCORE_UNCERTAINTY: u8 = 10;

/// Forecasts cover at most the current day plus three.
const MAX_FORECAST_DAYS: usize = 4;

type SharedFetch = Shared<BoxFuture<'static, Result<serde_json::Value, AppError>>>;

/// Whether a fetch may fall back to an expired cached payload when the
/// upstream refresh fails. Only the critical weather feed gets this; the
/// degradable feeds have cheaper fallbacks already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaleGrace {
    ServeStale,
    Refuse,
}

/// Neutral astronomy fragment substituted when the seeing feed is down or
/// has no usable record: average seeing and transparency, neutral cloud
/// estimate, stable air.
pub(crate) fn default_astro(time: DateTime<Utc>) -> RawAstroRecord {
    RawAstroRecord {
        time,
        seeing: 3,
        transparency: 3,
        cloud_cover_pct: 50.0,
        stability: Stability::Stable,
        humidity_pct: 50.0,
        wind_speed_kmh: 0.0,
        wind_direction: CompassPoint::N,
    }
}

/// The observability engine. Feed clients, cache and timezone are injected
/// so tests can point them at mock servers and fake stores.
pub struct Engine {
    weather: OpenMeteoClient,
    seeing: SevenTimerClient,
    cache: TieredCache,
    config: EngineConfig,
    /// Observer's UTC offset, used for local-day bucketing, night-hour
    /// selection and the moon model.
    timezone: FixedOffset,
    /// In-flight fetch per cache key; later callers attach to the shared
    /// future instead of issuing a duplicate network call.
    inflight: Mutex<HashMap<String, SharedFetch>>,
}

impl Engine {
    pub fn new(config: EngineConfig, cache: TieredCache, timezone: FixedOffset) -> Self {
        let weather = OpenMeteoClient::new(&config.user_agent, config.fetch_timeout_secs);
        let seeing = SevenTimerClient::new(&config.user_agent, config.fetch_timeout_secs);
        Self::with_clients(config, cache, timezone, weather, seeing)
    }

    /// Wire in preconstructed clients.
    pub fn with_clients(
        config: EngineConfig,
        cache: TieredCache,
        timezone: FixedOffset,
        weather: OpenMeteoClient,
        seeing: SevenTimerClient,
    ) -> Self {
        Self {
            weather,
            seeing,
            cache,
            config,
            timezone,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Current fused conditions for a location.
    ///
    /// Picks the weather hour nearest to now, joins the nearest seeing
    /// record, and attaches moon state and (best-effort) sun times for the
    /// covering local day.
    pub async fn load_conditions(&self, location: Location) -> Result<Conditions, AppError> {
        let (weather_raw, astro_raw) = tokio::join!(
            self.weather_payload(location),
            self.seeing_payload(location)
        );

        let hours = open_meteo::extract_hour_records(&weather_raw?)?;
        let astro_records = self.astro_records_or_default(astro_raw);
        let sun_days = self.sun_times_best_effort(location).await;

        let now = Utc::now();
        let current = hours
            .iter()
            .min_by_key(|rec| (rec.time - now).num_seconds().unsigned_abs())
            .ok_or_else(|| AppError::Upstream {
                source_name: open_meteo::SOURCE_NAME,
                message: "empty hourly series".to_string(),
            })?;

        let astro = align::nearest_record(&astro_records, current.time)
            .cloned()
            .unwrap_or_else(|| default_astro(current.time));

        let today = align::local_date(now, self.timezone);
        let sun = sun_days
            .iter()
            .find(|(date, _)| *date == today)
            .map(|(_, times)| *times);

        Ok(Conditions {
            time: current.time,
            weather: current.clone(),
            astro,
            moon: moon::moon_at(now, self.timezone),
            sun,
        })
    }

    /// Up to 4 day forecasts for a location, ordered by date ascending.
    pub async fn load_forecast(
        &self,
        location: Location,
        mode: PhotoMode,
    ) -> Result<Vec<DayForecast>, AppError> {
        let (weather_raw, astro_raw) = tokio::join!(
            self.weather_payload(location),
            self.seeing_payload(location)
        );

        let hours = open_meteo::extract_hour_records(&weather_raw?)?;
        let astro_records = self.astro_records_or_default(astro_raw);

        let moon_by_day: HashMap<NaiveDate, MoonInfo> =
            align::group_by_local_day(&hours, self.timezone)
                .into_iter()
                .take(MAX_FORECAST_DAYS)
                .map(|(date, _)| (date, moon::moon_for_day(date, self.timezone)))
                .collect();

        Ok(build_forecast(
            &hours,
            &astro_records,
            &moon_by_day,
            self.timezone,
            mode,
        ))
    }

    /// Drop every cached payload for a location, forcing fresh fetches on
    /// the next load.
    pub fn invalidate(&self, location: Location) {
        let fragment = location.key_fragment();
        self.cache.remove(&format!("weather:{fragment}"));
        self.cache.remove(&format!("seeing:{fragment}"));
        self.cache.remove(&format!("sun:{fragment}"));
    }

    // --- fetch plumbing ---

    /// Weather is the critical feed: an expired cached payload is still
    /// served (with a warning) when the refresh fails, before giving up.
    async fn weather_payload(&self, location: Location) -> Result<serde_json::Value, AppError> {
        let key = format!("weather:{}", location.key_fragment());
        let ttl = Duration::seconds(self.config.weather_ttl_secs as i64);
        let client = self.weather.clone();
        self.fetch_coalesced(
            key,
            ttl,
            StaleGrace::ServeStale,
            async move { client.fetch_hourly(location).await }.boxed(),
        )
        .await
    }

    async fn seeing_payload(&self, location: Location) -> Result<serde_json::Value, AppError> {
        let key = format!("seeing:{}", location.key_fragment());
        let ttl = Duration::seconds(self.config.seeing_ttl_secs as i64);
        let client = self.seeing.clone();
        self.fetch_coalesced(
            key,
            ttl,
            StaleGrace::Refuse,
            async move { client.fetch_astro(location).await }.boxed(),
        )
        .await
    }

    /// The dependent sun-times fetch: non-critical, degrades to empty.
    async fn sun_times_best_effort(&self, location: Location) -> Vec<(NaiveDate, SunTimes)> {
        let key = format!("sun:{}", location.key_fragment());
        let ttl = Duration::seconds(self.config.sun_ttl_secs as i64);
        let client = self.weather.clone();
        let raw = self
            .fetch_coalesced(
                key,
                ttl,
                StaleGrace::Refuse,
                async move { client.fetch_sun_times(location).await }.boxed(),
            )
            .await;

        match raw.and_then(|value| open_meteo::extract_sun_times(&value)) {
            Ok(days) => days,
            Err(e) => {
                tracing::warn!("Sun times unavailable, continuing without: {}", e);
                Vec::new()
            }
        }
    }

    /// Seeing-feed degradation: any failure becomes an empty series, which
    /// the aligner resolves to the neutral default fragment per hour.
    fn astro_records_or_default(
        &self,
        raw: Result<serde_json::Value, AppError>,
    ) -> Vec<RawAstroRecord> {
        match raw.and_then(|value| seven_timer::extract_astro_records(&value)) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Seeing feed unavailable, using neutral defaults: {}", e);
                Vec::new()
            }
        }
    }

    /// Cache-then-coalesce fetch: a live cache hit short-circuits; otherwise
    /// at most one network call per key is in flight, with concurrent
    /// callers sharing its result. Successful payloads are written back
    /// with `ttl`. Under `StaleGrace::ServeStale`, a failed refresh falls
    /// back to an expired cached payload instead of erroring.
    async fn fetch_coalesced(
        &self,
        key: String,
        ttl: Duration,
        grace: StaleGrace,
        fetch: BoxFuture<'static, Result<serde_json::Value, AppError>>,
    ) -> Result<serde_json::Value, AppError> {
        let stale = match grace {
            StaleGrace::ServeStale => match self.cache.get_any(&key) {
                Some((value, true)) => {
                    tracing::debug!("Cache hit for {}", key);
                    return Ok(value);
                }
                Some((value, false)) => Some(value),
                None => None,
            },
            StaleGrace::Refuse => {
                if let Some(hit) = self.cache.get(&key) {
                    tracing::debug!("Cache hit for {}", key);
                    return Ok(hit);
                }
                None
            }
        };

        let shared = {
            let mut inflight = self.lock_inflight();
            match inflight.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let shared = fetch.shared();
                    inflight.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        let result = shared.await;
        self.lock_inflight().remove(&key);

        match result {
            Ok(value) => {
                self.cache.set(&key, value.clone(), ttl);
                Ok(value)
            }
            Err(e) => match stale {
                Some(value) => {
                    tracing::warn!("Refresh of {} failed ({}), serving stale data", key, e);
                    Ok(value)
                }
                None => Err(e),
            },
        }
    }

    fn lock_inflight(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedFetch>> {
        match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Aggregate hourly series into up to 4 day forecasts.
///
/// Pure function: groups weather hours by local calendar date, keeps the
/// night-relevant hours (local hour ≥18 or ≤6), scores each against its
/// nearest seeing record and that day's moon, and summarizes per day.
/// The moon is treated as risen for every night hour — a simplification,
/// not ephemeris.
pub fn build_forecast(
    weather_hours: &[RawHourRecord],
    astro_records: &[RawAstroRecord],
    moon_by_day: &HashMap<NaiveDate, MoonInfo>,
    timezone: FixedOffset,
    mode: PhotoMode,
) -> Vec<DayForecast> {
    align::group_by_local_day(weather_hours, timezone)
        .into_iter()
        .take(MAX_FORECAST_DAYS)
        .map(|(date, day_hours)| {
            let moon_info = moon_by_day
                .get(&date)
                .copied()
                .unwrap_or_else(|| moon::moon_for_day(date, timezone));
            let night_moon = MoonInfo {
                is_risen: true,
                ..moon_info
            };

            let hourly_scores: Vec<HourlyScore> = day_hours
                .iter()
                .filter(|rec| align::is_night_hour(align::local_hour(rec.time, timezone)))
                .map(|rec| {
                    let astro = align::nearest_record(astro_records, rec.time)
                        .cloned()
                        .unwrap_or_else(|| default_astro(rec.time));
                    let conditions = Conditions {
                        time: rec.time,
                        weather: (*rec).clone(),
                        astro,
                        moon: night_moon,
                        sun: None,
                    };
                    let s = score::calculate_score(&conditions, mode);
                    HourlyScore {
                        time: rec.time,
                        score: s.overall,
                        score_min: s.overall.saturating_sub(s.uncertainty),
                        score_max: s.overall.saturating_add(s.uncertainty).min(100),
                    }
                })
                .collect();

            let (overall, rating) = if hourly_scores.is_empty() {
                // No night hours in the bucket: neutral default day
                (50, ScoreRating::Good)
            } else {
                let mean = hourly_scores.iter().map(|h| f64::from(h.score)).sum::<f64>()
                    / hourly_scores.len() as f64;
                let overall = mean.round() as u8;
                (overall, ScoreRating::from_score(overall))
            };

            // First occurrence wins on ties: only a strictly greater score
            // replaces the current best.
            let best_hour = hourly_scores
                .iter()
                .fold(None::<&HourlyScore>, |best, hour| match best {
                    Some(b) if b.score >= hour.score => Some(b),
                    _ => Some(hour),
                })
                .map(|h| h.time);

            DayForecast {
                date,
                overall,
                rating,
                uncertainty: DAY_SCORE_UNCERTAINTY,
                hourly_scores,
                best_hour,
            }
        })
        .collect()
}
