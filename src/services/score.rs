//! Observability score engine.
//!
//! Combines normalized per-parameter sub-scores into a single weighted
//! 0–100 score per photography mode, derives an uncertainty band from the
//! cloud-layer spread, and raises rule-based warnings. Pure functions all
//! the way down: identical input always yields an identical `Score`.

use crate::models::{
    Conditions, FactorScore, PhotoMode, Score, ScoreBreakdown, ScoreRating, Severity, Warning,
    WarningKind,
};

/// Per-mode factor weights. Each set sums to exactly 1.0.
#[derive(Debug, Clone, Copy)]
pub struct ModeWeights {
    pub cloud: f64,
    pub seeing: f64,
    pub transparency: f64,
    pub moon: f64,
    pub humidity: f64,
}

impl ModeWeights {
    pub fn for_mode(mode: PhotoMode) -> Self {
        match mode {
            PhotoMode::General => ModeWeights {
                cloud: 0.40,
                seeing: 0.20,
                transparency: 0.20,
                moon: 0.15,
                humidity: 0.05,
            },
            PhotoMode::DeepSky => ModeWeights {
                cloud: 0.40,
                seeing: 0.10,
                transparency: 0.30,
                moon: 0.15,
                humidity: 0.05,
            },
            PhotoMode::Planetary => ModeWeights {
                cloud: 0.35,
                seeing: 0.40,
                transparency: 0.10,
                moon: 0.10,
                humidity: 0.05,
            },
            PhotoMode::MilkyWay => ModeWeights {
                cloud: 0.45,
                seeing: 0.05,
                transparency: 0.25,
                moon: 0.20,
                humidity: 0.05,
            },
        }
    }

    pub fn sum(&self) -> f64 {
        self.cloud + self.seeing + self.transparency + self.moon + self.humidity
    }
}

// ---------------------------------------------------------------------------
// Sub-score functions (all clamped to [0, 100], total over missing input)
// ---------------------------------------------------------------------------

/// Cloud sub-score: `100 − cloud cover`. Missing → 50.
pub fn cloud_subscore(cloud_cover_pct: Option<f64>) -> f64 {
    match cloud_cover_pct {
        Some(pct) => (100.0 - pct).clamp(0.0, 100.0),
        None => 50.0,
    }
}

/// Seeing sub-score: `rating × 20`, capped at 100. Missing or 0 → 60.
pub fn seeing_subscore(seeing_rating: Option<u8>) -> f64 {
    match seeing_rating {
        Some(0) | None => 60.0,
        Some(r) => (f64::from(r) * 20.0).min(100.0),
    }
}

/// Transparency sub-score: `rating × 20`, capped at 100. Missing or 0 → 60.
pub fn transparency_subscore(transparency_rating: Option<u8>) -> f64 {
    match transparency_rating {
        Some(0) | None => 60.0,
        Some(r) => (f64::from(r) * 20.0).min(100.0),
    }
}

/// Moon sub-score. A set moon only costs 30% of its illumination penalty;
/// a risen moon costs the full penalty. Missing illumination → 80.
pub fn moon_subscore(illumination_pct: Option<f64>, is_risen: bool) -> f64 {
    match illumination_pct {
        Some(illum) if is_risen => (100.0 - illum).clamp(0.0, 100.0),
        Some(illum) => (100.0 - illum * 0.3).clamp(0.0, 100.0),
        None => 80.0,
    }
}

/// Humidity sub-score, stepwise. Missing → 70.
pub fn humidity_subscore(humidity_pct: Option<f64>) -> f64 {
    let Some(h) = humidity_pct else {
        return 70.0;
    };
    if h <= 50.0 {
        100.0
    } else if h <= 60.0 {
        90.0
    } else if h <= 70.0 {
        75.0
    } else if h <= 80.0 {
        50.0
    } else if h <= 90.0 {
        25.0
    } else {
        10.0
    }
}

/// Score uncertainty (± points) from the cloud-layer spread.
/// Missing spread → 0.
pub fn uncertainty_from_spread(spread: Option<f64>) -> u8 {
    match spread {
        Some(s) if s > 40.0 => 20,
        Some(s) if s > 25.0 => 15,
        Some(s) if s > 15.0 => 10,
        Some(s) if s > 5.0 => 5,
        Some(_) => 0,
        None => 0,
    }
}

// ---------------------------------------------------------------------------
// Warning rules (evaluated in fixed order; all independent, none fatal)
// ---------------------------------------------------------------------------

/// Evaluate the warning rules against fused conditions.
pub fn evaluate_warnings(conditions: &Conditions) -> Vec<Warning> {
    let weather = &conditions.weather;
    let mut warnings = Vec::new();

    // 1. Fog risk: saturated air, worse when it is also cold.
    if weather.humidity_pct >= 85.0 && weather.temperature_c <= 5.0 {
        warnings.push(Warning {
            kind: WarningKind::FogRisk,
            severity: Severity::High,
            message: format!(
                "High fog risk: {:.0}% humidity at {:.0}°C",
                weather.humidity_pct, weather.temperature_c
            ),
        });
    } else if weather.humidity_pct >= 75.0 {
        warnings.push(Warning {
            kind: WarningKind::FogRisk,
            severity: Severity::Medium,
            message: format!("Fog possible: {:.0}% humidity", weather.humidity_pct),
        });
    }

    // 2. Wind: tracking and long exposures suffer first.
    if weather.wind_speed_kmh >= 30.0 {
        warnings.push(Warning {
            kind: WarningKind::Wind,
            severity: Severity::High,
            message: format!(
                "Strong wind ({:.0} km/h) — unusable for long exposures",
                weather.wind_speed_kmh
            ),
        });
    } else if weather.wind_speed_kmh >= 20.0 {
        warnings.push(Warning {
            kind: WarningKind::Wind,
            severity: Severity::Medium,
            message: format!("Wind {:.0} km/h may shake the mount", weather.wind_speed_kmh),
        });
    }

    // 3. Clouds.
    if weather.cloud_cover >= 70.0 {
        warnings.push(Warning {
            kind: WarningKind::Clouds,
            severity: Severity::High,
            message: format!("Heavy cloud cover ({:.0}%)", weather.cloud_cover),
        });
    } else if weather.cloud_cover >= 40.0 {
        warnings.push(Warning {
            kind: WarningKind::Clouds,
            severity: Severity::Medium,
            message: format!("Partial cloud cover ({:.0}%)", weather.cloud_cover),
        });
    }

    // 4. Bright moon washing out faint targets.
    if conditions.moon.is_risen && conditions.moon.illumination_pct >= 70.0 {
        warnings.push(Warning {
            kind: WarningKind::BrightMoon,
            severity: Severity::Medium,
            message: format!(
                "Moon is up at {:.0}% illumination",
                conditions.moon.illumination_pct
            ),
        });
    }

    // 5. Forecast confidence from the cloud-layer spread.
    if weather.confidence() == crate::models::Confidence::Low {
        warnings.push(Warning {
            kind: WarningKind::LowConfidence,
            severity: Severity::Low,
            message: "Cloud forecast models disagree — low confidence".to_string(),
        });
    }

    warnings
}

/// Compute the observability score for fused conditions under a mode.
pub fn calculate_score(conditions: &Conditions, mode: PhotoMode) -> Score {
    let weights = ModeWeights::for_mode(mode);

    let breakdown = ScoreBreakdown {
        cloud: FactorScore {
            subscore: cloud_subscore(Some(conditions.weather.cloud_cover)),
            weight: weights.cloud,
        },
        seeing: FactorScore {
            subscore: seeing_subscore(Some(conditions.astro.seeing)),
            weight: weights.seeing,
        },
        transparency: FactorScore {
            subscore: transparency_subscore(Some(conditions.astro.transparency)),
            weight: weights.transparency,
        },
        moon: FactorScore {
            subscore: moon_subscore(
                Some(conditions.moon.illumination_pct),
                conditions.moon.is_risen,
            ),
            weight: weights.moon,
        },
        humidity: FactorScore {
            subscore: humidity_subscore(Some(conditions.weather.humidity_pct)),
            weight: weights.humidity,
        },
    };

    let weighted_sum = breakdown.cloud.subscore * breakdown.cloud.weight
        + breakdown.seeing.subscore * breakdown.seeing.weight
        + breakdown.transparency.subscore * breakdown.transparency.weight
        + breakdown.moon.subscore * breakdown.moon.weight
        + breakdown.humidity.subscore * breakdown.humidity.weight;

    let overall = weighted_sum.round().clamp(0.0, 100.0) as u8;

    Score {
        overall,
        rating: ScoreRating::from_score(overall),
        uncertainty: uncertainty_from_spread(Some(conditions.weather.cloud_spread())),
        breakdown,
        warnings: evaluate_warnings(conditions),
    }
}
