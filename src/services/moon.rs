//! Local moon phase model.
//!
//! Computed, not fetched: fractional position in the synodic cycle from a
//! fixed reference new moon, and illuminated fraction from the phase angle.
//! The "is risen" flag is a coarse approximation (moonrise drifts roughly
//! 50 minutes later per day across the cycle), not an ephemeris — fine for
//! scoring, not for pointing a telescope.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

/// Mean length of the synodic month in days.
const SYNODIC_MONTH_DAYS: f64 = 29.53058867;

/// Reference new moon: 2000-01-06 18:14 UTC.
const REFERENCE_NEW_MOON_SECS: i64 = 947_182_440;

/// Approximate hours the moon stays above the horizon after rising.
const MOON_UP_HOURS: f64 = 12.0;

/// Moon phase at an instant, as a fraction of the synodic cycle in [0, 1).
/// 0 = new moon, 0.5 = full moon.
pub fn moon_phase(at: DateTime<Utc>) -> f64 {
    let elapsed_days = (at.timestamp() - REFERENCE_NEW_MOON_SECS) as f64 / 86_400.0;
    let cycles = elapsed_days / SYNODIC_MONTH_DAYS;
    cycles.rem_euclid(1.0)
}

/// Illuminated fraction as a percent: `(1 − cos(2π·phase)) / 2 × 100`.
pub fn illumination_pct(phase: f64) -> f64 {
    (1.0 - (2.0 * std::f64::consts::PI * phase).cos()) / 2.0 * 100.0
}

/// Coarse risen check: the moon rises around 06:00 local at new moon and
/// drifts one full day across the cycle (≈50 min/day), staying up for
/// about 12 hours. A simplification, not real altitude computation.
pub fn is_risen(at: DateTime<Utc>, offset: FixedOffset) -> bool {
    let phase = moon_phase(at);
    let local = at.with_timezone(&offset);
    let hour = local.hour() as f64 + f64::from(local.minute()) / 60.0;

    let rise_hour = (6.0 + phase * 24.0).rem_euclid(24.0);
    let since_rise = (hour - rise_hour).rem_euclid(24.0);
    since_rise < MOON_UP_HOURS
}

/// Moon state for a whole calendar day, evaluated at local noon so every
/// hour of the day shares one phase/illumination value.
pub fn moon_for_day(date: NaiveDate, offset: FixedOffset) -> crate::models::MoonInfo {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
    let local_noon = offset
        .from_local_datetime(&date.and_time(noon))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(noon)));

    let phase = moon_phase(local_noon);
    crate::models::MoonInfo {
        phase,
        illumination_pct: illumination_pct(phase),
        is_risen: is_risen(local_noon, offset),
    }
}

/// Moon state at an instant.
pub fn moon_at(at: DateTime<Utc>, offset: FixedOffset) -> crate::models::MoonInfo {
    let phase = moon_phase(at);
    crate::models::MoonInfo {
        phase,
        illumination_pct: illumination_pct(phase),
        is_risen: is_risen(at, offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_zero_at_reference_new_moon() {
        let at = DateTime::from_timestamp(REFERENCE_NEW_MOON_SECS, 0).unwrap();
        assert!(moon_phase(at) < 1e-9);
    }

    #[test]
    fn test_phase_wraps_after_full_cycle() {
        let at = DateTime::from_timestamp(
            REFERENCE_NEW_MOON_SECS + (SYNODIC_MONTH_DAYS * 86_400.0) as i64,
            0,
        )
        .unwrap();
        let phase = moon_phase(at);
        assert!(phase < 1e-5 || phase > 1.0 - 1e-5, "phase = {phase}");
    }

    #[test]
    fn test_phase_in_unit_interval_before_reference() {
        // Dates before the reference epoch still land in [0, 1)
        let at = "1999-12-01T00:00:00Z".parse().unwrap();
        let phase = moon_phase(at);
        assert!((0.0..1.0).contains(&phase));
    }

    #[test]
    fn test_illumination_extremes() {
        assert!(illumination_pct(0.0).abs() < 1e-9);
        assert!((illumination_pct(0.5) - 100.0).abs() < 1e-9);
        assert!((illumination_pct(0.25) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_known_full_moon_is_bright() {
        // 2026-01-03 is a full moon (within a day); illumination should be
        // well past 90%.
        let at = "2026-01-03T12:00:00Z".parse().unwrap();
        let illum = illumination_pct(moon_phase(at));
        assert!(illum > 90.0, "illumination = {illum}");
    }

    #[test]
    fn test_risen_window_spans_12_hours() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 1, 24).unwrap();
        let risen_hours = (0..24)
            .filter(|&h| {
                let t = Utc
                    .from_utc_datetime(&day.and_hms_opt(h, 0, 0).unwrap());
                is_risen(t, offset)
            })
            .count();
        // The rise hour drifts slightly within the day, so allow ±1.
        assert!((11..=13).contains(&risen_hours), "risen {risen_hours}h");
    }
}
