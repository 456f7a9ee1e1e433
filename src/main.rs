//! Command-line front end for the observability engine.
//!
//! Usage: `nightsight <latitude> <longitude> [mode]`
//!
//! Prints the current fused conditions and score, then the 4-day outlook.
//! Mode is one of `general`, `deep-sky`, `planetary`, `milky-way`
//! (default `general`).

use std::fmt::Write as _;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nightsight::cache::{FileStore, TieredCache};
use nightsight::config::EngineConfig;
use nightsight::errors::AppError;
use nightsight::models::{Conditions, DayForecast, Location, PhotoMode, Score};
use nightsight::services::forecast::Engine;
use nightsight::services::score::calculate_score;

fn usage() -> ExitCode {
    eprintln!("Usage: nightsight <latitude> <longitude> [general|deep-sky|planetary|milky-way]");
    ExitCode::from(2)
}

/// Parse positional arguments into a location and mode.
fn parse_args(args: &[String]) -> Result<(Location, PhotoMode), AppError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(AppError::BadRequest(
            "expected <latitude> <longitude> [mode]".to_string(),
        ));
    }
    let latitude: f64 = args[0]
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid latitude '{}'", args[0])))?;
    let longitude: f64 = args[1]
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid longitude '{}'", args[1])))?;
    let mode = match args.get(2) {
        Some(raw) => raw.parse().map_err(AppError::BadRequest)?,
        None => PhotoMode::General,
    };
    Ok((Location::new(latitude, longitude), mode))
}

/// Render the current-conditions block: score, the weather-side values, and
/// the seeing feed's full record (including its own humidity/wind estimate
/// and the stability label).
fn render_conditions(conditions: &Conditions, score: &Score) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Now ({}): {} / 100 ({}), ±{}",
        conditions.time, score.overall, score.rating, score.uncertainty
    );
    let _ = writeln!(
        out,
        "  clouds {:.0}%  temp {:.1}°C  humidity {:.0}%  wind {:.0} km/h {}",
        conditions.weather.cloud_cover,
        conditions.weather.temperature_c,
        conditions.weather.humidity_pct,
        conditions.weather.wind_speed_kmh,
        conditions.weather.wind_direction
    );
    let _ = writeln!(
        out,
        "  seeing {}/5  transparency {}/5  air {}  moon {:.0}%{}",
        conditions.astro.seeing,
        conditions.astro.transparency,
        conditions.astro.stability,
        conditions.moon.illumination_pct,
        if conditions.moon.is_risen { " (up)" } else { "" }
    );
    let _ = writeln!(
        out,
        "  seeing model: clouds {:.0}%  humidity {:.0}%  wind {:.0} km/h {}",
        conditions.astro.cloud_cover_pct,
        conditions.astro.humidity_pct,
        conditions.astro.wind_speed_kmh,
        conditions.astro.wind_direction
    );
    if let Some(sun) = conditions.sun {
        let _ = writeln!(out, "  sunrise {}  sunset {}", sun.sunrise, sun.sunset);
    }
    for warning in &score.warnings {
        let _ = writeln!(out, "  ! [{:?}] {}", warning.severity, warning.message);
    }
    out
}

/// Render the day-by-day outlook.
fn render_forecast(days: &[DayForecast], mode: PhotoMode, timezone: chrono::FixedOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Outlook ({}):", mode.as_str());
    for day in days {
        let best = day
            .best_hour
            .map(|t| format!(", best around {}", t.with_timezone(&timezone).format("%H:%M")))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {}: {} / 100 ({}), ±{}{}",
            day.date, day.overall, day.rating, day.uncertainty, best
        );
    }
    out
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nightsight=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (location, mode) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{e}");
            return usage();
        }
    };

    let config = EngineConfig::from_env();
    let store = FileStore::new(&config.cache_dir, config.cache_max_entries);
    let cache = TieredCache::new(Box::new(store));
    let timezone = *chrono::Local::now().offset();
    let engine = Engine::new(config, cache, timezone);

    tracing::info!(
        "Loading conditions for {} (mode: {})",
        location.key_fragment(),
        mode.as_str()
    );

    let conditions = match engine.load_conditions(location).await {
        Ok(conditions) => conditions,
        Err(e) => {
            eprintln!("Failed to load conditions: {e}");
            return ExitCode::FAILURE;
        }
    };
    let score = calculate_score(&conditions, mode);
    print!("{}", render_conditions(&conditions, &score));

    let forecast = match engine.load_forecast(location, mode).await {
        Ok(days) => days,
        Err(e) => {
            eprintln!("Failed to load forecast: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!();
    print!("{}", render_forecast(&forecast, mode, timezone));

    ExitCode::SUCCESS
}
