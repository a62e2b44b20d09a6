//! Controller and network tunables.
//!
//! Both structs deserialize from JSON; missing fields fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Body pitch range in degrees, measured from level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchLimits {
    pub up: f32,
    pub down: f32,
}

impl Default for PitchLimits {
    fn default() -> Self {
        Self {
            up: 80.0,
            down: 80.0,
        }
    }
}

/// Per-actor tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub max_speed: f32,
    pub max_acceleration: f32,
    pub jump_force: f32,
    pub sensitivity: f32,
    pub smoothing: f32,
    pub ground_stick_distance: f32,
    /// Lateral offset of the fallback ground probes.
    pub ground_probe_spread: f32,
    pub push_force_scale: f32,
    pub interact_distance: f32,
    pub mass: f32,
    pub health: f32,
    pub minimum_damage: f32,
    pub fov: f32,
    pub zoom_fov: f32,
    pub look_pitch_limit: f32,
    pub body_pitch: PitchLimits,
    pub toggle_crouch: bool,
    pub has_health: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_speed: 10.0,
            max_acceleration: 75.0,
            jump_force: 100.0,
            sensitivity: 85.0,
            smoothing: 60.0,
            ground_stick_distance: 1.5,
            ground_probe_spread: 0.2,
            push_force_scale: 1.0,
            interact_distance: 5.0,
            mass: 5.0,
            health: 0.5,
            minimum_damage: 0.5,
            fov: 65.0,
            zoom_fov: 20.0,
            look_pitch_limit: crate::LOOK_PITCH_LIMIT,
            body_pitch: PitchLimits::default(),
            toggle_crouch: false,
            has_health: false,
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("max_speed", self.max_speed),
            ("max_acceleration", self.max_acceleration),
            ("jump_force", self.jump_force),
            ("ground_stick_distance", self.ground_stick_distance),
            ("ground_probe_spread", self.ground_probe_spread),
            ("interact_distance", self.interact_distance),
            ("minimum_damage", self.minimum_damage),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is negative"),
                });
            }
        }

        if self.mass <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "mass",
                reason: format!("{} must be positive", self.mass),
            });
        }

        if !(0.0..=1.0).contains(&self.push_force_scale) {
            return Err(ConfigError::Invalid {
                field: "push_force_scale",
                reason: format!("{} is outside [0, 1]", self.push_force_scale),
            });
        }

        let pitches = [
            ("look_pitch_limit", self.look_pitch_limit),
            ("body_pitch.up", self.body_pitch.up),
            ("body_pitch.down", self.body_pitch.down),
        ];
        for (field, value) in pitches {
            if value <= 0.0 || value > 90.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside (0, 90]"),
                });
            }
        }

        Ok(())
    }
}

/// Transport and scheduling tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub tick_hz: u32,
    pub input_relay_interval: u64,
    pub client_timeout_secs: u64,
    pub max_clients: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            tick_hz: crate::FIXED_TICK_HZ,
            input_relay_interval: crate::INPUT_RELAY_INTERVAL,
            client_timeout_secs: 5,
            max_clients: 16,
        }
    }
}

impl NetConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        if config.input_relay_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "input_relay_interval",
                reason: "must be at least 1".into(),
            });
        }
        Ok(config)
    }

    pub fn timestep(&self) -> f32 {
        1.0 / self.tick_hz.max(1) as f32
    }
}
