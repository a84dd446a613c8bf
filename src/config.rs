//! Runtime settings read from the environment (see `util::env`).
use std::time::Duration;

use crate::util::env::{env_flag, env_opt, env_parse};

pub const DEFAULT_NAGER_BASE_URL: &str = "https://date.nager.at/api/v3";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NAGER_BASE_URL.to_string(),
            connect_timeout: Duration::from_millis(5_000),
            read_timeout: Duration::from_millis(10_000),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: env_opt("NAGER_API_BASE_URL").unwrap_or(d.base_url),
            connect_timeout: Duration::from_millis(env_parse("NAGER_CONNECT_TIMEOUT_MS", 5_000u64)),
            read_timeout: Duration::from_millis(env_parse("NAGER_READ_TIMEOUT_MS", 10_000u64)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Ceiling on concurrent provider calls during the fetch stage.
    pub fetch_concurrency: usize,
    /// Hard upper bound for one unit's fetch, on top of the HTTP timeouts.
    pub unit_timeout: Duration,
    pub sync_on_startup: bool,
    pub schedule_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 10,
            unit_timeout: Duration::from_secs(30),
            sync_on_startup: true,
            schedule_enabled: true,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            fetch_concurrency: env_parse("SYNC_FETCH_CONCURRENCY", 10usize).clamp(1, 64),
            unit_timeout: Duration::from_secs(env_parse("SYNC_UNIT_TIMEOUT_SECS", 30u64).max(1)),
            sync_on_startup: env_flag("SYNC_ON_STARTUP", true),
            schedule_enabled: env_flag("SYNC_SCHEDULE", true),
        }
    }
}

/// Keys logged (redacted) by the startup preflight.
pub const LOGGED_KEYS: &[&str] = &[
    "DATABASE_URL",
    "DB_HOST",
    "DB_MAX_CONNS",
    "AUTO_MIGRATE",
    "NAGER_API_BASE_URL",
    "NAGER_CONNECT_TIMEOUT_MS",
    "NAGER_READ_TIMEOUT_MS",
    "SYNC_FETCH_CONCURRENCY",
    "SYNC_UNIT_TIMEOUT_SECS",
    "SYNC_ON_STARTUP",
    "SYNC_SCHEDULE",
    "API_HOST",
    "API_PORT",
    "API_SECRET",
    "ALLOWED_ORIGINS",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_contract() {
        let p = ProviderConfig::default();
        assert_eq!(p.base_url, DEFAULT_NAGER_BASE_URL);
        assert_eq!(p.connect_timeout, Duration::from_secs(5));
        let s = SyncConfig::default();
        assert_eq!(s.fetch_concurrency, 10);
        assert!(s.sync_on_startup && s.schedule_enabled);
    }
}
