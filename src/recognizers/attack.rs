// Impulse-Attack recognizer
// Fires on the onset of a sharp swing, measured as accelerometer jerk

use serde::{Deserialize, Serialize};

use crate::config::{check_window, ConfigError};
use crate::events::Action;
use crate::features::{delta_magnitude, distance, FeatureWindow};
use crate::recognizers::machine::{GestureLatch, LatchConfig, Phase, Transition};
use crate::recognizers::Recognizer;
use crate::sample::{Millis, MotionSample, Vec3};

/// Thresholds for attack detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Delta-magnitude (m/s^2 between consecutive samples) that starts a swing
    pub high: f64,

    /// The swing is over once the delta-magnitude, or the distance back to
    /// the reading taken just before the swing, falls below this
    pub low: f64,

    /// Minimum time between attack triggers
    pub refractory_ms: Millis,

    /// Accelerometer history length
    pub window: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        AttackConfig {
            high: 25.0,
            low: 5.0,
            refractory_ms: 150,
            window: 40,
        }
    }
}

impl AttackConfig {
    pub fn latch(&self) -> LatchConfig {
        LatchConfig {
            start: self.high,
            stop: Some(self.low),
            refractory_ms: self.refractory_ms,
            timeout_ms: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.latch().validate("attack")?;
        check_window("attack.window", self.window)
    }
}

/// Edge-triggered attack detector
pub struct AttackRecognizer {
    window: FeatureWindow<Vec3>,
    latch: GestureLatch,

    /// Reading just before the current swing started
    rest: Option<Vec3>,
}

impl AttackRecognizer {
    pub fn new(config: &AttackConfig) -> Self {
        AttackRecognizer {
            window: FeatureWindow::new(config.window),
            latch: GestureLatch::new(config.latch()),
            rest: None,
        }
    }

    /// Jerk between the two most recent samples
    pub fn current_delta(&self) -> f64 {
        delta_magnitude(&self.window)
    }
}

impl Recognizer for AttackRecognizer {
    type Input = MotionSample;

    fn observe_gated(&mut self, sample: &MotionSample, may_trigger: bool) -> Option<Action> {
        if !sample.value.is_finite() || !self.window.push_at(sample.value, sample.capture_ms) {
            log::debug!("Attack: dropped sample at {} ms", sample.capture_ms);
            return None;
        }

        let speed = delta_magnitude(&self.window);
        let level = match self.rest {
            // Snapping back to the starting pose ends the swing as well
            Some(rest) if self.latch.is_engaged() => speed.min(distance(&rest, &sample.value)),
            _ => speed,
        };

        match self.latch.step_gated(level, sample.capture_ms, may_trigger) {
            Transition::Triggered => {
                self.rest = self.window.last_two().map(|(prev, _)| prev);
                log::debug!("Attack start: delta {:.2} at {} ms", speed, sample.capture_ms);
                Some(Action::Attack)
            }
            Transition::Released => {
                self.rest = None;
                None
            }
            Transition::Hold => None,
        }
    }

    fn phase(&self) -> Phase {
        self.latch.phase()
    }
}
