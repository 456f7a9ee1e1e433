//! Unit/scale conversion tables for the two upstream feeds.
//!
//! Every function here is total: unknown, missing or out-of-range input
//! maps to a documented neutral default, never an error. The seeing feed
//! speaks in small integer codes on provider-specific scales; everything
//! is converted once, here, into the canonical domain (0–100 percentages,
//! 1–5 quality ratings, compass labels).

use crate::models::{CompassPoint, Stability};

/// Seeing code (provider scale 1–8, lower = better) → canonical 1–5, 5 = best.
///
/// Missing input maps to 3, the same neutral midpoint the engine
/// substitutes when the whole seeing feed is down.
pub fn seeing_from_code(code: Option<u8>) -> u8 {
    match code {
        Some(v) if v <= 2 => 5,
        Some(v) if v <= 4 => 4,
        Some(5) => 3,
        Some(6) => 2,
        Some(_) => 1,
        None => 3,
    }
}

/// Transparency code (provider scale 1–8, higher = better) → canonical 1–5.
pub fn transparency_from_code(code: Option<u8>) -> u8 {
    match code {
        Some(v) if v >= 7 => 5,
        Some(v) if v >= 5 => 4,
        Some(4) => 3,
        Some(v) if v >= 2 => 2,
        Some(_) => 1,
        None => 3,
    }
}

/// Cloud-cover bucket midpoints for provider codes 1–9.
const CLOUD_BUCKET_MIDPOINTS: [f64; 9] = [3.0, 12.5, 25.0, 37.5, 50.0, 62.5, 75.0, 87.5, 97.0];

/// Cloud-cover code (1–9 bucket) → percent via midpoint-of-bucket.
/// Missing or out-of-range codes (including 0) → 50 (neutral).
pub fn cloud_percent_from_code(code: Option<u8>) -> f64 {
    match code {
        Some(c) if (1..=9).contains(&c) => CLOUD_BUCKET_MIDPOINTS[(c - 1) as usize],
        _ => 50.0,
    }
}

/// Humidity code (discrete −4..16) → percent.
///
/// The provider encodes relative humidity in 5% steps: code −4 is the
/// "below 5%" bucket, each increment adds 5%, saturating at 100%.
/// Unknown codes → 50.
pub fn humidity_percent_from_code(code: Option<i8>) -> f64 {
    match code {
        Some(c) if (-4..=16).contains(&c) => (f64::from(c + 4) * 5.0 + 5.0).min(100.0),
        _ => 50.0,
    }
}

/// Wind-speed bucket values in km/h for provider codes 1–8.
const WIND_SPEED_KMH: [f64; 8] = [0.5, 3.0, 9.0, 16.0, 25.0, 36.0, 47.0, 59.0];

/// Wind-speed code (1–8) → km/h. Unknown → 0.
pub fn wind_speed_kmh_from_code(code: Option<u8>) -> f64 {
    match code {
        Some(c) if (1..=8).contains(&c) => WIND_SPEED_KMH[(c - 1) as usize],
        _ => 0.0,
    }
}

/// Wind direction in degrees (0–360) → one of 8 compass labels.
pub fn compass_from_degrees(degrees: f64) -> CompassPoint {
    const POINTS: [CompassPoint; 8] = [
        CompassPoint::N,
        CompassPoint::NE,
        CompassPoint::E,
        CompassPoint::SE,
        CompassPoint::S,
        CompassPoint::SW,
        CompassPoint::W,
        CompassPoint::NW,
    ];
    let idx = ((degrees / 45.0).round() as i64).rem_euclid(8) as usize;
    POINTS[idx]
}

/// Lifted index → qualitative stability label.
/// ≥6 very stable, ≥1 stable, ≥−3 slightly unstable, else unstable.
/// Missing input → stable (the provider's most common reading).
pub fn stability_from_lifted_index(lifted_index: Option<f64>) -> Stability {
    match lifted_index {
        Some(li) if li >= 6.0 => Stability::VeryStable,
        Some(li) if li >= 1.0 => Stability::Stable,
        Some(li) if li >= -3.0 => Stability::SlightlyUnstable,
        Some(_) => Stability::Unstable,
        None => Stability::Stable,
    }
}

/// Clamp a percentage into [0, 100].
pub fn clamp_percent(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Clamp a quality rating into [1, 5].
pub fn clamp_rating(v: u8) -> u8 {
    v.clamp(1, 5)
}
