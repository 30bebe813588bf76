//! Runtime configuration
//!
//! Layered the usual way:
//! - compiled-in defaults
//! - an optional JSON document (durations as humantime strings, "2s", "1500ms")
//! - `THUMBVOTE_*` environment overrides
//!
//! `validate` runs last and rejects anything the session cannot honor.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thumbvote_core::ConfigError;
use thumbvote_gesture::{HoldConfig, ObservationPolicy, DEFAULT_HOLD_DURATION};
use thumbvote_time::DEFAULT_TICK_INTERVAL;

use crate::{CameraConstraints, EngineConfig};

/// Delay between confirmation and the tally increment
pub const DEFAULT_TALLY_DELAY: Duration = Duration::from_millis(1500);
/// Delay between the tally increment and returning to recognition
pub const DEFAULT_COOLDOWN_DELAY: Duration = Duration::from_millis(1000);

pub const ENV_HOLD_DURATION: &str = "THUMBVOTE_HOLD_DURATION";
pub const ENV_TALLY_DELAY: &str = "THUMBVOTE_TALLY_DELAY";
pub const ENV_COOLDOWN_DELAY: &str = "THUMBVOTE_COOLDOWN_DELAY";
pub const ENV_TICK_INTERVAL: &str = "THUMBVOTE_TICK_INTERVAL";
pub const ENV_MIN_CONFIDENCE: &str = "THUMBVOTE_MIN_CONFIDENCE";
pub const ENV_DELEGATE: &str = "THUMBVOTE_DELEGATE";

/// Top-level configuration
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// How long a gesture must be held to count
    #[serde(deserialize_with = "de_duration")]
    pub hold_duration: Duration,
    /// Confirmation to tally increment
    #[serde(deserialize_with = "de_duration")]
    pub tally_delay: Duration,
    /// Tally increment to recognition resuming
    #[serde(deserialize_with = "de_duration")]
    pub cooldown_delay: Duration,
    /// Frame period of the real-time tick source
    #[serde(deserialize_with = "de_duration")]
    pub tick_interval: Duration,
    /// Optional confidence floor for the top candidate
    pub min_confidence: Option<f32>,
    pub engine: EngineConfig,
    pub camera: CameraConstraints,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            hold_duration: DEFAULT_HOLD_DURATION,
            tally_delay: DEFAULT_TALLY_DELAY,
            cooldown_delay: DEFAULT_COOLDOWN_DELAY,
            tick_interval: DEFAULT_TICK_INTERVAL,
            min_confidence: None,
            engine: EngineConfig::default(),
            camera: CameraConstraints::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Defaults, then `path` if given, then the environment; validated
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::Malformed(format!("{}: {e}", path.display()))
                })?;
                Self::from_json_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let durations: [(&str, &'static str, &mut Duration); 4] = [
            (ENV_HOLD_DURATION, "hold_duration", &mut self.hold_duration),
            (ENV_TALLY_DELAY, "tally_delay", &mut self.tally_delay),
            (ENV_COOLDOWN_DELAY, "cooldown_delay", &mut self.cooldown_delay),
            (ENV_TICK_INTERVAL, "tick_interval", &mut self.tick_interval),
        ];
        for (key, field, slot) in durations {
            if let Some(value) = lookup(key) {
                *slot = parse_duration(field, &value)?;
            }
        }

        if let Some(value) = lookup(ENV_MIN_CONFIDENCE) {
            let value = value.trim();
            self.min_confidence = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "min_confidence",
                    value: value.to_string(),
                })?)
            };
        }

        if let Some(value) = lookup(ENV_DELEGATE) {
            self.engine.delegate = value.trim().parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("hold_duration", self.hold_duration),
            ("tally_delay", self.tally_delay),
            ("cooldown_delay", self.cooldown_delay),
            ("tick_interval", self.tick_interval),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::NonPositiveDuration { field });
            }
        }
        ObservationPolicy::from_option(self.min_confidence)?;
        self.engine.validate()
    }

    pub fn hold(&self) -> Result<HoldConfig, ConfigError> {
        HoldConfig::new(self.hold_duration)
    }

    pub fn observation_policy(&self) -> Result<ObservationPolicy, ConfigError> {
        ObservationPolicy::from_option(self.min_confidence)
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|_| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    })
}

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
