use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "TelecareScheduling";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "telecare_scheduling=info,tower_http=info"
}

/// Get the application data directory.
/// Platform data dir (e.g. `~/.local/share/TelecareScheduling`), or the
/// working directory when none can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite file location.
pub fn database_path() -> PathBuf {
    app_data_dir().join("scheduling.db")
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lifetime of a cached slot expansion.
    pub slot_cache_ttl_secs: u64,
    /// Longest date range a slot query may span, inclusive.
    pub max_range_days: u32,
    pub reminder_poll_interval_secs: u64,
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_cache_ttl_secs: 3600,
            max_range_days: 366,
            reminder_poll_interval_secs: 60,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            database_path: database_path(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TELECARE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "TELECARE_SLOT_CACHE_TTL_SECS")? {
            config.slot_cache_ttl_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "TELECARE_MAX_RANGE_DAYS")? {
            config.max_range_days = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, "TELECARE_REMINDER_POLL_INTERVAL_SECS")? {
            if v == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "TELECARE_REMINDER_POLL_INTERVAL_SECS",
                    value: "0".into(),
                });
            }
            config.reminder_poll_interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "TELECARE_BIND_ADDR")? {
            config.bind_addr = v;
        }
        if let Some(path) = lookup("TELECARE_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        Ok(config)
    }

    pub fn slot_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.slot_cache_ttl_secs)
    }

    pub fn reminder_poll_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_poll_interval_secs)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn database_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("scheduling.db"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn defaults_without_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.slot_cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.max_range_days, 366);
        assert_eq!(config.bind_addr.port(), 8787);
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("TELECARE_SLOT_CACHE_TTL_SECS", "60"),
            ("TELECARE_MAX_RANGE_DAYS", " 31 "),
            ("TELECARE_BIND_ADDR", "0.0.0.0:9000"),
            ("TELECARE_DATABASE_PATH", "/tmp/sched.db"),
        ]))
        .unwrap();
        assert_eq!(config.slot_cache_ttl_secs, 60);
        assert_eq!(config.max_range_days, 31);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/sched.db"));
    }

    #[test]
    fn unparsable_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[("TELECARE_MAX_RANGE_DAYS", "lots")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "TELECARE_MAX_RANGE_DAYS",
                value: "lots".into()
            }
        );
        assert!(EngineConfig::from_lookup(lookup_from(&[(
            "TELECARE_REMINDER_POLL_INTERVAL_SECS",
            "0"
        )]))
        .is_err());
    }
}
