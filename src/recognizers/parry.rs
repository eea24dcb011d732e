// Rotation-Parry recognizer
// Fires when the wrist twists hard around the device's Y axis

use serde::{Deserialize, Serialize};

use crate::config::{check_window, ConfigError};
use crate::events::Action;
use crate::features::{peak, FeatureWindow};
use crate::recognizers::machine::{GestureLatch, LatchConfig, Phase, Transition};
use crate::recognizers::Recognizer;
use crate::sample::{Axis, Millis, MotionSample, Vec3};

/// Thresholds for parry detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParryConfig {
    /// Peak |gyro.y| (rad/s) over the window that starts a parry
    pub high: f64,

    /// Peak |gyro.y| below which the parry is over
    pub low: f64,

    pub refractory_ms: Millis,

    /// Gyroscope history length; a twist anywhere in it counts
    pub window: usize,
}

impl Default for ParryConfig {
    fn default() -> Self {
        ParryConfig {
            high: 4.0,
            low: 1.6,
            refractory_ms: 150,
            window: 12,
        }
    }
}

impl ParryConfig {
    pub fn latch(&self) -> LatchConfig {
        LatchConfig {
            start: self.high,
            stop: Some(self.low),
            refractory_ms: self.refractory_ms,
            timeout_ms: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.latch().validate("parry")?;
        check_window("parry.window", self.window)
    }
}

pub struct ParryRecognizer {
    window: FeatureWindow<Vec3>,
    latch: GestureLatch,
}

impl ParryRecognizer {
    pub fn new(config: &ParryConfig) -> Self {
        ParryRecognizer {
            window: FeatureWindow::new(config.window),
            latch: GestureLatch::new(config.latch()),
        }
    }
}

impl Recognizer for ParryRecognizer {
    type Input = MotionSample;

    fn observe_gated(&mut self, sample: &MotionSample, may_trigger: bool) -> Option<Action> {
        if !sample.value.is_finite() || !self.window.push_at(sample.value, sample.capture_ms) {
            log::debug!("Parry: dropped sample at {} ms", sample.capture_ms);
            return None;
        }

        let twist = peak(&self.window, Axis::Y);
        match self.latch.step_gated(twist, sample.capture_ms, may_trigger) {
            Transition::Triggered => {
                log::debug!("Parry start: gyro.y peak {:.2} at {} ms", twist, sample.capture_ms);
                Some(Action::Parry)
            }
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        self.latch.phase()
    }
}
