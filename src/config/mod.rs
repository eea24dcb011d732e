// Engine configuration
// Per-gesture thresholds, button bindings and arbitration policy, loadable
// from JSON and validated before any sample is processed

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arbiter::ArbiterConfig;
use crate::events::Action;
use crate::features::{MAX_WINDOW, MIN_WINDOW};
use crate::pipeline::session::ButtonConfig;
use crate::recognizers::{
    AttackConfig, CameraDashConfig, CrouchConfig, DashConfig, DashForwardConfig, JumpConfig,
    ParryConfig, WalkConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field}: value {value} is not finite")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field}: stop threshold {stop} must be below start threshold {start}")]
    Hysteresis {
        field: &'static str,
        start: f64,
        stop: f64,
    },

    #[error("{field}: window of {size} samples outside [{min}, {max}]", min = MIN_WINDOW, max = MAX_WINDOW)]
    WindowSize { field: &'static str, size: usize },

    #[error("{field}: {value} must be positive")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field}: {value} is out of range")]
    OutOfDomain { field: &'static str, value: f64 },

    #[error("{field}: latch has neither a stop threshold nor a timeout")]
    NoRelease { field: &'static str },

    #[error("{field}: action {action} is not allowed here")]
    InvalidAction { field: &'static str, action: Action },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field, value })
    }
}

pub fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// Smoothing factors live in (0, 1]
pub fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check_finite(field, value)?;
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfDomain { field, value })
    }
}

pub fn check_hysteresis(field: &'static str, start: f64, stop: f64) -> Result<(), ConfigError> {
    if stop < start {
        Ok(())
    } else {
        Err(ConfigError::Hysteresis { field, start, stop })
    }
}

pub fn check_window(field: &'static str, size: usize) -> Result<(), ConfigError> {
    if (MIN_WINDOW..=MAX_WINDOW).contains(&size) {
        Ok(())
    } else {
        Err(ConfigError::WindowSize { field, size })
    }
}

/// Everything the engine needs to build sessions and the arbitrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub attack: AttackConfig,
    pub parry: ParryConfig,
    pub dash: DashConfig,
    pub camera_dash: CameraDashConfig,
    pub dash_forward: DashForwardConfig,
    pub jump: JumpConfig,
    pub crouch: CrouchConfig,
    pub walk: WalkConfig,
    pub buttons: ButtonConfig,
    pub arbiter: ArbiterConfig,

    /// Attack, parry and dash suppress each other while one is in progress
    pub exclusive_motion: bool,

    /// Landmarks may fall this far outside [0, 1] before a frame is dropped
    pub landmark_margin: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            attack: AttackConfig::default(),
            parry: ParryConfig::default(),
            dash: DashConfig::default(),
            camera_dash: CameraDashConfig::default(),
            dash_forward: DashForwardConfig::default(),
            jump: JumpConfig::default(),
            crouch: CrouchConfig::default(),
            walk: WalkConfig::default(),
            buttons: ButtonConfig::default(),
            arbiter: ArbiterConfig::default(),
            exclusive_motion: true,
            landmark_margin: 0.1,
        }
    }
}

impl EngineConfig {
    /// Check every section; the first problem found is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.attack.validate()?;
        self.parry.validate()?;
        self.dash.validate()?;
        self.camera_dash.validate()?;
        self.dash_forward.validate()?;
        self.jump.validate()?;
        self.crouch.validate()?;
        self.walk.validate()?;
        self.buttons.validate()?;
        self.arbiter.validate()?;

        check_finite("landmark_margin", self.landmark_margin)?;
        if !(0.0..=0.5).contains(&self.landmark_margin) {
            return Err(ConfigError::OutOfDomain {
                field: "landmark_margin",
                value: self.landmark_margin,
            });
        }
        Ok(())
    }

    /// Parse and validate; missing sections fall back to defaults
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}
