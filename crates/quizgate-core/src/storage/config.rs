//! TOML-based application configuration.
//!
//! Stores the policy constants that gate and time sessions:
//! - Media completion threshold for video/audio gating
//! - Warning/critical countdown ratios
//! - Default tick cadence for the session hub
//!
//! Configuration is stored at `~/.config/quizgate/config.toml`. Defaults
//! reproduce the production behavior (0.8 / 0.10 / 0.05).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::clock::{DEFAULT_CRITICAL_RATIO, DEFAULT_WARNING_RATIO};
use crate::error::ConfigError;
use crate::gating::GatingPolicy;
use crate::session::SessionPolicy;

/// Gating-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingConfig {
    /// Watched ratio at which video/audio count as complete.
    #[serde(default = "default_media_threshold")]
    pub media_completion_threshold: f64,
}

/// Countdown-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,
    #[serde(default = "default_critical_ratio")]
    pub critical_ratio: f64,
    /// Tick cadence for hub-driven sessions, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/quizgate/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gating: GatingConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

fn default_media_threshold() -> f64 {
    0.8
}
fn default_warning_ratio() -> f64 {
    DEFAULT_WARNING_RATIO
}
fn default_critical_ratio() -> f64 {
    DEFAULT_CRITICAL_RATIO
}
fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            media_completion_threshold: default_media_threshold(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            warning_ratio: default_warning_ratio(),
            critical_ratio: default_critical_ratio(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/quizgate"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return (and write) the default.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Write to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// The session policy these settings describe.
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            gating: GatingPolicy {
                media_completion_threshold: self.gating.media_completion_threshold,
            },
            warning_ratio: self.timer.warning_ratio,
            critical_ratio: self.timer.critical_ratio,
        }
    }

    /// Read a value by dotted path, e.g. `timer.warning_ratio`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    /// Set a value by dotted path, preserving the existing value's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut root =
            serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = &mut root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: e.to_string(),
                        })?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| ConfigError::InvalidValue {
                                    key: key.to_string(),
                                    message: format!("cannot parse '{value}' as number"),
                                })?
                        } else {
                            return Err(ConfigError::InvalidValue {
                                key: key.to_string(),
                                message: format!("cannot parse '{value}' as number"),
                            });
                        }
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                *self = serde_json::from_value(root).map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_policy() {
        let config = Config::default();
        assert!((config.gating.media_completion_threshold - 0.8).abs() < f64::EPSILON);
        assert!((config.timer.warning_ratio - 0.10).abs() < f64::EPSILON);
        assert!((config.timer.critical_ratio - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.timer.tick_interval_ms, 1000);
    }

    #[test]
    fn toml_round_trip_with_partial_file() {
        let parsed: Config = toml::from_str(
            "[timer]\nwarning_ratio = 0.2\n",
        )
        .unwrap();
        assert!((parsed.timer.warning_ratio - 0.2).abs() < f64::EPSILON);
        // Omitted sections fall back to defaults.
        assert!((parsed.timer.critical_ratio - 0.05).abs() < f64::EPSILON);
        assert!((parsed.gating.media_completion_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn get_and_set_by_dotted_path() {
        let mut config = Config::default();
        config.set("gating.media_completion_threshold", "0.9").unwrap();
        assert!((config.gating.media_completion_threshold - 0.9).abs() < f64::EPSILON);

        let value = config.get("timer.tick_interval_ms").unwrap();
        assert_eq!(value, serde_json::json!(1000));

        assert!(matches!(
            config.set("timer.no_such_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(config.get("nope").is_none());
    }

    #[test]
    fn session_policy_reflects_settings() {
        let mut config = Config::default();
        config.set("timer.warning_ratio", "0.25").unwrap();
        let policy = config.session_policy();
        assert!((policy.warning_ratio - 0.25).abs() < f64::EPSILON);
        assert!((policy.gating.media_completion_threshold - 0.8).abs() < f64::EPSILON);
    }
}
