//! Engine configuration (env-driven).

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use rota_events::Shift;

use crate::realtime::ReconnectPolicy;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shift shown and synced on startup.
    pub shift: Shift,

    /// Optional JSON file of members to seed the in-memory store with.
    pub seed_file: Option<PathBuf>,

    /// First reconnect delay.
    pub sync_base_delay: Duration,

    /// Upper bound on a single reconnect delay.
    pub sync_max_delay: Duration,

    /// Reconnect attempts before live sync gives up.
    pub sync_max_attempts: u32,

    /// Window in which identical notifications are suppressed.
    pub notify_debounce: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let shift = var("ROTA_SHIFT")
            .map(|v| v.parse::<Shift>())
            .transpose()
            .context("ROTA_SHIFT must be one of A, B, C.")?
            .unwrap_or(Shift::A);

        let seed_file = var("ROTA_SEED_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let parse_ms = |key: &str, default: u64| -> Result<u64> {
            Ok(var(key)
                .map(|v| v.parse::<u64>())
                .transpose()
                .with_context(|| format!("{key} must be an integer (milliseconds)."))?
                .unwrap_or(default))
        };

        let sync_base_delay = Duration::from_millis(parse_ms("ROTA_SYNC_BASE_DELAY_MS", 1000)?.max(1));
        let sync_max_delay = Duration::from_millis(parse_ms("ROTA_SYNC_MAX_DELAY_MS", 30_000)?)
            .max(sync_base_delay);

        let sync_max_attempts: u32 = var("ROTA_SYNC_MAX_ATTEMPTS")
            .map(|v| v.parse())
            .transpose()
            .context("ROTA_SYNC_MAX_ATTEMPTS must be an integer.")?
            .unwrap_or(10);

        let notify_debounce = Duration::from_millis(parse_ms("ROTA_NOTIFY_DEBOUNCE_MS", 10_000)?);

        let log_level = var("ROTA_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            shift,
            seed_file,
            sync_base_delay,
            sync_max_delay,
            sync_max_attempts,
            notify_debounce,
            log_level,
        })
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base: self.sync_base_delay,
            max: self.sync_max_delay,
            max_attempts: self.sync_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.shift, Shift::A);
        assert!(config.seed_file.is_none());
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.notify_debounce, Duration::from_secs(10));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ROTA_SHIFT", "c"),
            ("ROTA_SEED_FILE", "/tmp/roster.json"),
            ("ROTA_SYNC_MAX_ATTEMPTS", "3"),
            ("ROTA_SYNC_BASE_DELAY_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.shift, Shift::C);
        assert_eq!(config.seed_file, Some(PathBuf::from("/tmp/roster.json")));
        assert_eq!(config.sync_max_attempts, 3);
        assert_eq!(config.sync_base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(load(&[("ROTA_SHIFT", "D")]).is_err());
        assert!(load(&[("ROTA_SYNC_MAX_DELAY_MS", "soon")]).is_err());
    }
}
