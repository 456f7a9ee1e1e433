//! Core data model: normalized feed records, fused conditions, scores and
//! day forecasts.
//!
//! Everything here is produced by the normalization boundary (feed clients
//! plus `services::normalize`) and consumed fully populated by the score
//! engine. Missing feed values are defaulted exactly once, at parse time,
//! so downstream code never re-checks for absent fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Observer location in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Cache-key fragment, rounded to 4 decimal places (~11 m) so nearby
    /// refreshes for the same spot hit the same entry.
    pub fn key_fragment(&self) -> String {
        format!("{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Forecast confidence, derived from the cloud-layer spread (max − min).
///
/// The weather feed has no native ensemble spread; the low/mid/high cloud
/// layer disagreement stands in as a synthetic uncertainty proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// spread < 20 → high, < 40 → medium, else low.
    pub fn from_spread(spread: f64) -> Self {
        if spread < 20.0 {
            Confidence::High
        } else if spread < 40.0 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One of the 8 principal compass points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompassPoint {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::NE => "NE",
            CompassPoint::E => "E",
            CompassPoint::SE => "SE",
            CompassPoint::S => "S",
            CompassPoint::SW => "SW",
            CompassPoint::W => "W",
            CompassPoint::NW => "NW",
        }
    }
}

impl std::fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative atmospheric stability, from the seeing feed's lifted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stability {
    VeryStable,
    Stable,
    SlightlyUnstable,
    Unstable,
}

impl Stability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::VeryStable => "very stable",
            Stability::Stable => "stable",
            Stability::SlightlyUnstable => "slightly unstable",
            Stability::Unstable => "unstable",
        }
    }
}

impl std::fmt::Display for Stability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized hour of general weather forecast data.
///
/// Immutable once produced; regenerated wholesale on every fetch.
#[derive(Debug, Clone, Serialize)]
pub struct RawHourRecord {
    pub time: DateTime<Utc>,
    /// Total cloud cover, percent (0–100).
    pub cloud_cover: f64,
    /// Lowest of the low/mid/high cloud layers, percent.
    pub cloud_cover_min: f64,
    /// Highest of the low/mid/high cloud layers, percent.
    pub cloud_cover_max: f64,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction: CompassPoint,
    pub precipitation_probability_pct: f64,
}

impl RawHourRecord {
    /// Cloud-layer disagreement, the synthetic uncertainty proxy.
    pub fn cloud_spread(&self) -> f64 {
        self.cloud_cover_max - self.cloud_cover_min
    }

    pub fn confidence(&self) -> Confidence {
        Confidence::from_spread(self.cloud_spread())
    }
}

/// One normalized hour of specialized astronomy forecast data.
///
/// Same lifecycle as [`RawHourRecord`] but from an independent provider on
/// its own time grid (model init instant + integer hour offsets). Humidity
/// and wind survive normalization even though the weather feed stays
/// authoritative for scoring — they round out the feed's full shape.
#[derive(Debug, Clone, Serialize)]
pub struct RawAstroRecord {
    pub time: DateTime<Utc>,
    /// Seeing quality, 1–5, 5 = best.
    pub seeing: u8,
    /// Transparency, 1–5, 5 = best.
    pub transparency: u8,
    /// Provider's own cloud cover estimate, percent.
    pub cloud_cover_pct: f64,
    pub stability: Stability,
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction: CompassPoint,
}

/// Moon state at an instant: phase ∈ [0, 1), illuminated fraction as a
/// percent, and a (crude) risen flag.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MoonInfo {
    pub phase: f64,
    pub illumination_pct: f64,
    pub is_risen: bool,
}

/// Sunrise/sunset instants for one calendar day.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// Fused observing conditions for a single instant: a weather hour joined
/// with its temporally-nearest astronomy record, plus moon and sun context.
///
/// Built fresh per invocation, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Conditions {
    pub time: DateTime<Utc>,
    pub weather: RawHourRecord,
    pub astro: RawAstroRecord,
    pub moon: MoonInfo,
    /// Sun times for the covering day; `None` when the dependent sun-times
    /// fetch failed (non-critical, degraded gracefully).
    pub sun: Option<SunTimes>,
}

/// Named weighting profile for combining sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoMode {
    General,
    DeepSky,
    Planetary,
    MilkyWay,
}

impl PhotoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoMode::General => "general",
            PhotoMode::DeepSky => "deep-sky",
            PhotoMode::Planetary => "planetary",
            PhotoMode::MilkyWay => "milky-way",
        }
    }
}

impl std::str::FromStr for PhotoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(PhotoMode::General),
            "deep-sky" => Ok(PhotoMode::DeepSky),
            "planetary" => Ok(PhotoMode::Planetary),
            "milky-way" => Ok(PhotoMode::MilkyWay),
            other => Err(format!("unknown photography mode: {other}")),
        }
    }
}

/// Ordinal quality rating. Variant order defines the ordering:
/// poor < moderate < good < very-good < perfect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreRating {
    Poor,
    Moderate,
    Good,
    VeryGood,
    Perfect,
}

impl ScoreRating {
    /// Inclusive lower bounds: ≥90 perfect, ≥70 very-good, ≥50 good,
    /// ≥30 moderate, else poor.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => ScoreRating::Perfect,
            70..=89 => ScoreRating::VeryGood,
            50..=69 => ScoreRating::Good,
            30..=49 => ScoreRating::Moderate,
            _ => ScoreRating::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreRating::Poor => "poor",
            ScoreRating::Moderate => "moderate",
            ScoreRating::Good => "good",
            ScoreRating::VeryGood => "very-good",
            ScoreRating::Perfect => "perfect",
        }
    }
}

impl std::fmt::Display for ScoreRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    FogRisk,
    Wind,
    Clouds,
    BrightMoon,
    LowConfidence,
}

/// A rule-based advisory attached to a score. Never fatal.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
}

/// One factor's contribution to a score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FactorScore {
    /// Sub-score, 0–100.
    pub subscore: f64,
    /// Weight, 0–1. Weights across a breakdown sum to 1.0.
    pub weight: f64,
}

/// Per-factor breakdown of an overall score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreBreakdown {
    pub cloud: FactorScore,
    pub seeing: FactorScore,
    pub transparency: FactorScore,
    pub moon: FactorScore,
    pub humidity: FactorScore,
}

/// Output of the score engine for one instant and photography mode.
///
/// Pure function output — no identity, no lifecycle, recomputed on demand.
#[derive(Debug, Clone, Serialize)]
pub struct Score {
    /// Weighted overall score, 0–100.
    pub overall: u8,
    pub rating: ScoreRating,
    /// Points of ± spread around `overall`, from the cloud-layer proxy.
    pub uncertainty: u8,
    pub breakdown: ScoreBreakdown,
    /// Advisories in rule-evaluation order; multiple may co-occur.
    pub warnings: Vec<Warning>,
}

/// One scored night hour within a day forecast.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyScore {
    pub time: DateTime<Utc>,
    pub score: u8,
    /// `score − uncertainty`, clamped ≥ 0.
    pub score_min: u8,
    /// `score + uncertainty`, clamped ≤ 100.
    pub score_max: u8,
}

/// Aggregated observability outlook for one local calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    /// Rounded mean of the night-hour scores (50 when no night hours).
    pub overall: u8,
    pub rating: ScoreRating,
    /// Fixed day-level spread; see DESIGN.md on why this is a constant.
    pub uncertainty: u8,
    pub hourly_scores: Vec<HourlyScore>,
    /// Timestamp of the maximum-score hour, first occurrence on ties.
    pub best_hour: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(Confidence::from_spread(0.0), Confidence::High);
        assert_eq!(Confidence::from_spread(19.9), Confidence::High);
        assert_eq!(Confidence::from_spread(20.0), Confidence::Medium);
        assert_eq!(Confidence::from_spread(39.9), Confidence::Medium);
        assert_eq!(Confidence::from_spread(40.0), Confidence::Low);
    }

    #[test]
    fn test_rating_thresholds() {
        assert_eq!(ScoreRating::from_score(100), ScoreRating::Perfect);
        assert_eq!(ScoreRating::from_score(90), ScoreRating::Perfect);
        assert_eq!(ScoreRating::from_score(89), ScoreRating::VeryGood);
        assert_eq!(ScoreRating::from_score(70), ScoreRating::VeryGood);
        assert_eq!(ScoreRating::from_score(69), ScoreRating::Good);
        assert_eq!(ScoreRating::from_score(50), ScoreRating::Good);
        assert_eq!(ScoreRating::from_score(49), ScoreRating::Moderate);
        assert_eq!(ScoreRating::from_score(30), ScoreRating::Moderate);
        assert_eq!(ScoreRating::from_score(29), ScoreRating::Poor);
        assert_eq!(ScoreRating::from_score(0), ScoreRating::Poor);
    }

    #[test]
    fn test_rating_is_ordinal() {
        assert!(ScoreRating::Poor < ScoreRating::Moderate);
        assert!(ScoreRating::Moderate < ScoreRating::Good);
        assert!(ScoreRating::Good < ScoreRating::VeryGood);
        assert!(ScoreRating::VeryGood < ScoreRating::Perfect);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("deep-sky".parse::<PhotoMode>(), Ok(PhotoMode::DeepSky));
        assert!("macro".parse::<PhotoMode>().is_err());
    }

    #[test]
    fn test_location_key_fragment_rounds() {
        let a = Location::new(47.376888, 8.541694);
        let b = Location::new(47.376894, 8.541701);
        assert_eq!(a.key_fragment(), b.key_fragment());
    }
}
