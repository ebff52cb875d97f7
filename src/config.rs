//! Tunable engine configuration.
//!
//! XP award amounts are configuration, not constants baked into the
//! mutation algorithm. A `config.json` next to the database file overrides
//! the defaults; a missing or unparsable file silently falls back, the same
//! way the database loader starts fresh.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// XP awarded for status transitions into Done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpConfig {
    /// Base award for completing any task.
    #[serde(default = "default_base_completion")]
    pub base_completion: u64,
    /// Extra award when the completed task is High priority.
    #[serde(default = "default_high_bonus")]
    pub high_bonus: u64,
    /// Extra award when the completed task is Critical priority.
    #[serde(default = "default_critical_bonus")]
    pub critical_bonus: u64,
}

fn default_base_completion() -> u64 {
    150
}

fn default_high_bonus() -> u64 {
    100
}

fn default_critical_bonus() -> u64 {
    250
}

impl Default for XpConfig {
    fn default() -> Self {
        XpConfig {
            base_completion: default_base_completion(),
            high_bonus: default_high_bonus(),
            critical_bonus: default_critical_bonus(),
        }
    }
}

/// Application configuration loaded from `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub xp: XpConfig,
    /// Interval, in seconds, at which long-running callers should fold an
    /// open timer session back into `time_spent`.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Username assumed when no --user flag is given.
    #[serde(default)]
    pub default_user: Option<String>,
}

fn default_heartbeat_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            xp: XpConfig::default(),
            heartbeat_secs: default_heartbeat_secs(),
            default_user: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults if the
    /// file is missing or malformed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return AppConfig::default();
        }
        match fs::read_to_string(path) {
            Ok(buf) => match serde_json::from_str(&buf) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Error parsing config, using defaults: {e}");
                    AppConfig::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading config, using defaults: {e}");
                AppConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.xp.base_completion, 150);
        assert_eq!(cfg.xp.high_bonus, 100);
        assert_eq!(cfg.xp.critical_bonus, 250);
        assert_eq!(cfg.heartbeat_secs, 30);
    }

    #[test]
    fn test_partial_config_fills_missing_fields() {
        let cfg: AppConfig = serde_json::from_str(r#"{"xp": {"base_completion": 200}}"#).unwrap();
        assert_eq!(cfg.xp.base_completion, 200);
        assert_eq!(cfg.xp.high_bonus, 100);
        assert_eq!(cfg.heartbeat_secs, 30);
    }
}
