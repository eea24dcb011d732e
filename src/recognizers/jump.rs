// Vertical-Jump recognizer
// Tracks smoothed hip height against a self-calibrating standing baseline.
// Image y grows downward, so upward displacement and velocity are negative.

use serde::{Deserialize, Serialize};

use crate::config::{check_finite, check_unit_interval, ConfigError};
use crate::events::Action;
use crate::features::{ema, FeatureWindow};
use crate::recognizers::machine::{Phase, Refractory};
use crate::recognizers::Recognizer;
use crate::sample::Millis;

/// Thresholds for jump detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    /// Smoothing factor for hip height
    pub ema_alpha: f64,

    /// Displacement from baseline that counts as airborne (negative = up)
    pub jump_threshold: f64,

    /// Per-frame smoothed velocity that counts as rising (negative = up)
    pub velocity_threshold: f64,

    /// Displacement the hips must return above before re-arming
    pub rearm_threshold: f64,

    /// Lockout after a jump triggers
    pub trigger_cooldown_ms: Millis,

    /// Minimum lockout remaining once the jump has landed
    pub rearm_cooldown_ms: Millis,

    /// Fraction of the gap to the current height the baseline moves per
    /// stable frame
    pub calibration_rate: f64,

    /// |displacement| below which the stance counts as stable
    pub stable_displacement: f64,

    /// |velocity| below which the stance counts as stable
    pub stable_velocity: f64,
}

impl Default for JumpConfig {
    fn default() -> Self {
        JumpConfig {
            ema_alpha: 0.25,
            jump_threshold: -0.08,
            velocity_threshold: -0.015,
            rearm_threshold: -0.01,
            trigger_cooldown_ms: 500,
            rearm_cooldown_ms: 170,
            calibration_rate: 0.02,
            stable_displacement: 0.02,
            stable_velocity: 0.01,
        }
    }
}

impl JumpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("jump.ema_alpha", self.ema_alpha)?;
        check_unit_interval("jump.calibration_rate", self.calibration_rate)?;
        check_finite("jump.jump_threshold", self.jump_threshold)?;
        check_finite("jump.velocity_threshold", self.velocity_threshold)?;
        check_finite("jump.rearm_threshold", self.rearm_threshold)?;
        check_finite("jump.stable_displacement", self.stable_displacement)?;
        check_finite("jump.stable_velocity", self.stable_velocity)?;

        // Re-arm must sit strictly between the jump threshold and the baseline
        if !(self.jump_threshold < self.rearm_threshold && self.rearm_threshold <= 0.0) {
            return Err(ConfigError::Hysteresis {
                field: "jump",
                start: self.jump_threshold,
                stop: self.rearm_threshold,
            });
        }
        Ok(())
    }
}

/// Per-frame input: hip height plus whether the crouch recognizer is active
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HipSample {
    /// Normalized hip height (image y)
    pub y: f64,

    /// Crouching suspends baseline calibration
    pub crouching: bool,

    pub capture_ms: Millis,
}

pub struct JumpRecognizer {
    config: JumpConfig,
    phase: Phase,
    cooldown: Refractory,
    smoothed: FeatureWindow<f64>,
    baseline: Option<f64>,
}

impl JumpRecognizer {
    pub fn new(config: &JumpConfig) -> Self {
        JumpRecognizer {
            config: config.clone(),
            phase: Phase::Idle,
            cooldown: Refractory::new(config.trigger_cooldown_ms),
            smoothed: FeatureWindow::new(3),
            baseline: None,
        }
    }

    /// Current standing reference height
    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// Latest smoothed hip height
    pub fn smoothed_height(&self) -> Option<f64> {
        self.smoothed.latest()
    }

    /// Current (displacement, velocity)
    pub fn motion(&self) -> (f64, f64) {
        let height = self.smoothed.latest().unwrap_or(0.0);
        let displacement = self.baseline.map_or(0.0, |b| height - b);
        (displacement, self.velocity())
    }

    fn velocity(&self) -> f64 {
        self.smoothed
            .last_two()
            .map_or(0.0, |(prev, curr)| curr - prev)
    }
}

impl Recognizer for JumpRecognizer {
    type Input = HipSample;

    fn observe_gated(&mut self, hip: &HipSample, may_trigger: bool) -> Option<Action> {
        if !hip.y.is_finite() {
            return None;
        }
        let previous = self.smoothed.latest().unwrap_or(hip.y);
        let height = ema(previous, hip.y, self.config.ema_alpha);
        if !self.smoothed.push_at(height, hip.capture_ms) {
            return None;
        }

        let velocity = self.velocity();
        let baseline = *self.baseline.get_or_insert(height);
        let mut displacement = height - baseline;

        // Follow slow stance drift while standing still
        let stable = displacement.abs() < self.config.stable_displacement
            && velocity.abs() < self.config.stable_velocity;
        if self.phase == Phase::Idle && stable && !hip.crouching {
            let nudged = ema(baseline, height, self.config.calibration_rate);
            self.baseline = Some(nudged);
            displacement = height - nudged;
        }

        match self.phase {
            Phase::Idle => {
                let airborne = displacement < self.config.jump_threshold
                    && velocity < self.config.velocity_threshold;
                if may_trigger && airborne && self.cooldown.ready(hip.capture_ms) {
                    self.phase = Phase::Armed;
                    self.cooldown.mark(hip.capture_ms);
                    log::debug!(
                        "Jump: displacement {:.3}, velocity {:.3} at {} ms",
                        displacement,
                        velocity,
                        hip.capture_ms
                    );
                    return Some(Action::Jump);
                }
            }
            Phase::Armed | Phase::Committed => {
                if displacement > self.config.rearm_threshold && velocity > 0.0 {
                    self.phase = Phase::Idle;
                    self.cooldown
                        .extend(hip.capture_ms, self.config.rearm_cooldown_ms);
                } else {
                    self.phase = Phase::Committed;
                }
            }
        }

        None
    }

    fn phase(&self) -> Phase {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hip(y: f64, t: Millis) -> HipSample {
        HipSample {
            y,
            crouching: false,
            capture_ms: t,
        }
    }

    /// Feeds heights at 30 fps starting from `start_ms`, returning emitted actions
    fn feed(recognizer: &mut JumpRecognizer, heights: &[f64], start_ms: Millis) -> Vec<Action> {
        heights
            .iter()
            .enumerate()
            .filter_map(|(i, y)| recognizer.observe(&hip(*y, start_ms + i as Millis * 33)))
            .collect()
    }

    #[test]
    fn test_jump_detected() {
        let mut recognizer = JumpRecognizer::new(&JumpConfig::default());
        feed(&mut recognizer, &[0.6; 10], 0);

        let mut heights = vec![0.5, 0.4, 0.35, 0.35, 0.35];
        heights.extend([0.45, 0.55]);
        heights.extend([0.6; 12]);
        let fired = feed(&mut recognizer, &heights, 330);

        assert_eq!(fired, vec![Action::Jump]);
        assert_eq!(recognizer.phase(), Phase::Idle);
    }

    #[test]
    fn test_displacement_without_velocity_is_ignored() {
        // No smoothing, so each frame's velocity is exactly the step between frames
        let config = JumpConfig {
            ema_alpha: 1.0,
            ..JumpConfig::default()
        };
        let mut recognizer = JumpRecognizer::new(&config);
        assert!(feed(&mut recognizer, &[0.6; 5], 0).is_empty());

        // Rises well past the jump height, but slower than the velocity threshold
        let mut heights: Vec<f64> = (1..=13).map(|k| 0.6 - 0.012 * k as f64).collect();
        heights.extend([0.6 - 0.012 * 13.0; 10]);

        for (i, y) in heights.iter().enumerate() {
            let t = 165 + i as Millis * 33;
            assert_eq!(recognizer.observe(&hip(*y, t)), None, "jumped at {} ms", t);
            let (_, velocity) = recognizer.motion();
            assert!(velocity > config.velocity_threshold);
        }

        let (displacement, velocity) = recognizer.motion();
        assert!(displacement < config.jump_threshold);
        assert_eq!(velocity, 0.0);
        assert_eq!(recognizer.phase(), Phase::Idle);
    }

    #[test]
    fn test_baseline_follows_slow_drift() {
        let mut recognizer = JumpRecognizer::new(&JumpConfig::default());
        let mut fired = 0;

        // Hips sink 0.1 over 600 frames: far below any velocity threshold
        for i in 0..600u64 {
            let y = 0.5 + 0.1 * (i as f64 / 600.0);
            if recognizer.observe(&hip(y, i * 33)).is_some() {
                fired += 1;
            }
        }

        assert_eq!(fired, 0);
        let baseline = recognizer.baseline().unwrap();
        assert!(baseline > 0.55, "baseline stuck at {}", baseline);
    }

    #[test]
    fn test_crouching_freezes_baseline() {
        let mut recognizer = JumpRecognizer::new(&JumpConfig::default());
        recognizer.observe(&hip(0.5, 0));
        let before = recognizer.baseline().unwrap();

        for i in 1..100u64 {
            recognizer.observe(&HipSample {
                y: 0.51,
                crouching: true,
                capture_ms: i * 33,
            });
        }

        assert_eq!(recognizer.baseline(), Some(before));
    }

    #[test]
    fn test_no_retrigger_while_airborne() {
        let mut recognizer = JumpRecognizer::new(&JumpConfig::default());
        feed(&mut recognizer, &[0.6; 10], 0);

        // Keeps rising, never comes back down
        let heights: Vec<f64> = (0..20).map(|i| 0.55 - i as f64 * 0.025).collect();
        let fired = feed(&mut recognizer, &heights, 330);

        assert_eq!(fired, vec![Action::Jump]);
        assert_eq!(recognizer.phase(), Phase::Committed);
    }

    #[test]
    fn test_config_validation() {
        assert!(JumpConfig::default().validate().is_ok());

        let inverted = JumpConfig {
            rearm_threshold: -0.2,
            ..JumpConfig::default()
        };
        assert!(inverted.validate().is_err());

        let bad_alpha = JumpConfig {
            ema_alpha: 0.0,
            ..JumpConfig::default()
        };
        assert!(bad_alpha.validate().is_err());
    }
}
