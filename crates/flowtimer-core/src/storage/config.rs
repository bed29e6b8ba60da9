//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Mode durations (seconds) and whether abandoned time is recorded
//! - Auto-start behaviour and the long-break interval
//! - Tick loop frame length
//!
//! Configuration is stored at `~/.config/flowtimer/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::{ConfigError, CoreError};
use crate::timer::{AutoStartConfig, Durations};

pub const CONFIG_FILE: &str = "config.toml";

/// Timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus")]
    pub focus: u64,
    #[serde(default = "default_short_break")]
    pub short_break: u64,
    #[serde(default = "default_long_break")]
    pub long_break: u64,
    /// Log an interrupted session when a mode switch discards progress.
    #[serde(default)]
    pub record_abandoned: bool,
}

/// Tick loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickConfig {
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/flowtimer/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub auto_start: AutoStartConfig,
    #[serde(default)]
    pub tick: TickConfig,
}

fn default_focus() -> u64 {
    1500
}
fn default_short_break() -> u64 {
    300
}
fn default_long_break() -> u64 {
    900
}
fn default_frame_ms() -> u64 {
    250
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus: default_focus(),
            short_break: default_short_break(),
            long_break: default_long_break(),
            record_abandoned: false,
        }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            frame_ms: default_frame_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("'{value}' is not true/false")))?,
                    ),
                    // Every number in the config is a count; negatives clamp to zero.
                    serde_json::Value::Number(_) => match value.parse::<i64>() {
                        Ok(n) => serde_json::Value::Number(n.max(0).into()),
                        Err(_) => return Err(invalid(format!("'{value}' is not an integer"))),
                    },
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join(CONFIG_FILE))
    }

    /// Load from disk, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        Ok(Self::load_from(&Self::path()?)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                Ok(cfg.normalized())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), CoreError> {
        Ok(self.save_to(&Self::path()?)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, in memory. Out-of-range values are
    /// clamped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        *self = updated.normalized();
        Ok(())
    }

    /// Clamp every value into its valid range.
    pub fn normalized(mut self) -> Self {
        let durations = self.durations();
        self.timer.focus = durations.focus;
        self.timer.short_break = durations.short_break;
        self.timer.long_break = durations.long_break;
        self.auto_start = self.auto_start.normalized();
        self.tick.frame_ms = self.tick.frame_ms.max(1);
        self
    }

    pub fn durations(&self) -> Durations {
        Durations {
            focus: self.timer.focus,
            short_break: self.timer.short_break,
            long_break: self.timer.long_break,
        }
        .clamped()
    }

    pub fn auto_start(&self) -> AutoStartConfig {
        self.auto_start.normalized()
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.tick.frame_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.timer.focus, 1500);
        assert_eq!(parsed.auto_start.long_break_interval, 4);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nfocus = 3000\n").unwrap();
        assert_eq!(parsed.timer.focus, 3000);
        assert_eq!(parsed.timer.short_break, 300);
        assert_eq!(parsed.tick.frame_ms, 250);
        assert!(!parsed.auto_start.auto_start_break);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.focus").as_deref(), Some("1500"));
        assert_eq!(cfg.get("auto_start.auto_start_break").as_deref(), Some("false"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_bool_and_number() {
        let mut cfg = Config::default();
        cfg.set("auto_start.auto_start_focus", "true").unwrap();
        cfg.set("timer.short_break", "420").unwrap();
        assert!(cfg.auto_start.auto_start_focus);
        assert_eq!(cfg.durations().short_break, 420);
    }

    #[test]
    fn set_clamps_out_of_range_values() {
        let mut cfg = Config::default();
        cfg.set("timer.focus", "-5").unwrap();
        assert_eq!(cfg.timer.focus, 1);
        cfg.set("auto_start.long_break_interval", "1").unwrap();
        assert_eq!(cfg.auto_start.long_break_interval, 2);
        cfg.set("timer.focus", "100000000000000").unwrap();
        assert_eq!(cfg.timer.focus, Durations::MAX_SECS);
        cfg.set("auto_start.delay_ms", "9223372036854775807").unwrap();
        assert_eq!(cfg.auto_start.delay_ms, AutoStartConfig::MAX_DELAY_MS);
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.set("timer.nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set("timer", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            cfg.set("timer.record_abandoned", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("tick.frame_ms", "fast"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("timer.long_break", "1200").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().timer.long_break, 1200);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[timer\nfocus = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }
}
