/// Engine configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// User-Agent sent to both upstream feeds.
    pub user_agent: String,
    /// Directory holding the durable cache tier.
    pub cache_dir: String,
    /// Maximum number of entries the durable tier accepts before eviction.
    pub cache_max_entries: usize,
    /// Per-request deadline for upstream fetches, seconds.
    pub fetch_timeout_secs: u64,
    /// Cache TTL for the weather feed, seconds.
    pub weather_ttl_secs: u64,
    /// Cache TTL for the seeing feed, seconds.
    pub seeing_ttl_secs: u64,
    /// Cache TTL for the daily sun-times fetch, seconds.
    pub sun_ttl_secs: u64,
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            user_agent: std::env::var("METEO_USER_AGENT")
                .unwrap_or_else(|_| "Nightsight/0.1 (astrophotography scoring)".to_string()),
            cache_dir: std::env::var("CACHE_DIR").unwrap_or_else(|_| "./cache".to_string()),
            cache_max_entries: env_u64("CACHE_MAX_ENTRIES", 64) as usize,
            fetch_timeout_secs: env_u64("FETCH_TIMEOUT_SECS", 10),
            weather_ttl_secs: env_u64("WEATHER_TTL_SECS", 1800),
            seeing_ttl_secs: env_u64("SEEING_TTL_SECS", 7200),
            sun_ttl_secs: env_u64("SUN_TTL_SECS", 21600),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: "Nightsight/0.1 (astrophotography scoring)".to_string(),
            cache_dir: "./cache".to_string(),
            cache_max_entries: 64,
            fetch_timeout_secs: 10,
            weather_ttl_secs: 1800,
            seeing_ttl_secs: 7200,
            sun_ttl_secs: 21600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        // NOTE: set_var/remove_var in tests is unsafe in multi-threaded contexts
        // (Rust may run tests in parallel). This test only exercises the
        // default-value logic; cargo test runs this module's tests within one
        // test binary, so we accept the risk.
        unsafe {
            std::env::remove_var("METEO_USER_AGENT");
            std::env::remove_var("CACHE_DIR");
            std::env::remove_var("FETCH_TIMEOUT_SECS");
        }

        let config = EngineConfig::from_env();

        assert!(config.user_agent.contains("Nightsight"));
        assert_eq!(config.cache_dir, "./cache");
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.weather_ttl_secs, 1800);
    }

    #[test]
    fn test_env_u64_ignores_garbage() {
        unsafe {
            std::env::set_var("SEEING_TTL_SECS", "not-a-number");
        }
        let config = EngineConfig::from_env();
        assert_eq!(config.seeing_ttl_secs, 7200);
    }
}
