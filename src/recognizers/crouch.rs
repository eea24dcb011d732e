// Knee-Angle Crouch recognizer
// Level-triggered: proposes a crouch on every frame the knee stays bent

use serde::{Deserialize, Serialize};

use crate::config::{check_finite, ConfigError};
use crate::events::Action;
use crate::features::{joint_angle, Freshness};
use crate::recognizers::machine::Phase;
use crate::recognizers::Recognizer;
use crate::sample::{PoseFrame, Side};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrouchConfig {
    /// Knee angle (degrees, hip-knee-ankle) below which the player is crouching
    pub angle_threshold_deg: f64,

    /// Leg whose knee is measured
    pub side: Side,
}

impl Default for CrouchConfig {
    fn default() -> Self {
        CrouchConfig {
            angle_threshold_deg: 120.0,
            side: Side::Left,
        }
    }
}

impl CrouchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("crouch.angle_threshold_deg", self.angle_threshold_deg)?;
        if !(0.0..=180.0).contains(&self.angle_threshold_deg) {
            return Err(ConfigError::OutOfDomain {
                field: "crouch.angle_threshold_deg",
                value: self.angle_threshold_deg,
            });
        }
        Ok(())
    }
}

pub struct CrouchRecognizer {
    config: CrouchConfig,
    freshness: Freshness,
    phase: Phase,
    last_angle: Option<f64>,
}

impl CrouchRecognizer {
    pub fn new(config: &CrouchConfig) -> Self {
        CrouchRecognizer {
            config: config.clone(),
            freshness: Freshness::new(),
            phase: Phase::Idle,
            last_angle: None,
        }
    }

    /// True while the measured knee is below the threshold
    pub fn is_crouching(&self) -> bool {
        self.phase.is_engaged()
    }

    pub fn last_angle(&self) -> Option<f64> {
        self.last_angle
    }
}

impl Recognizer for CrouchRecognizer {
    type Input = PoseFrame;

    fn observe_gated(&mut self, frame: &PoseFrame, may_trigger: bool) -> Option<Action> {
        if !self.freshness.admit(frame.capture_ms) {
            return None;
        }

        let leg = frame.leg(self.config.side);
        let angle = joint_angle(leg.hip, leg.knee, leg.ankle);
        if !angle.is_finite() {
            return None;
        }
        self.last_angle = Some(angle);

        if angle >= self.config.angle_threshold_deg {
            self.phase = Phase::Idle;
            return None;
        }

        self.phase = match self.phase {
            Phase::Idle => Phase::Armed,
            _ => Phase::Committed,
        };
        if may_trigger {
            Some(Action::Crouch)
        } else {
            None
        }
    }

    fn phase(&self) -> Phase {
        self.phase
    }
}
