// Cyclic-Walk recognizer
// Walking in place: each knee raise is one step, legs latch independently
// but share a step cooldown

use serde::{Deserialize, Serialize};

use crate::config::{check_finite, check_hysteresis, ConfigError};
use crate::events::Action;
use crate::features::Freshness;
use crate::recognizers::machine::{GestureLatch, LatchConfig, Phase, Refractory, Transition};
use crate::recognizers::Recognizer;
use crate::sample::{Millis, PoseFrame, Side};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// hip.y - knee.y above which a knee counts as raised
    pub raise: f64,

    /// hip.y - knee.y below which the leg re-arms
    pub rearm: f64,

    /// Minimum spacing between steps of either leg
    pub cooldown_ms: Millis,
}

impl Default for WalkConfig {
    fn default() -> Self {
        WalkConfig {
            raise: -0.05,
            rearm: -0.12,
            cooldown_ms: 200,
        }
    }
}

impl WalkConfig {
    fn latch(&self) -> LatchConfig {
        LatchConfig {
            start: self.raise,
            stop: Some(self.rearm),
            refractory_ms: 0,
            timeout_ms: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("walk.raise", self.raise)?;
        check_finite("walk.rearm", self.rearm)?;
        check_hysteresis("walk", self.raise, self.rearm)
    }
}

/// Knee height relative to the hip; positive means the knee is above it
fn knee_lift(frame: &PoseFrame, side: Side) -> f64 {
    let leg = frame.leg(side);
    leg.hip.y - leg.knee.y
}

pub struct WalkRecognizer {
    freshness: Freshness,
    left: GestureLatch,
    right: GestureLatch,
    cooldown: Refractory,
    steps: u64,
}

impl WalkRecognizer {
    pub fn new(config: &WalkConfig) -> Self {
        WalkRecognizer {
            freshness: Freshness::new(),
            left: GestureLatch::new(config.latch()),
            right: GestureLatch::new(config.latch()),
            cooldown: Refractory::new(config.cooldown_ms),
            steps: 0,
        }
    }

    /// Steps emitted since creation
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn leg_phase(&self, side: Side) -> Phase {
        match side {
            Side::Left => self.left.phase(),
            Side::Right => self.right.phase(),
        }
    }
}

impl Recognizer for WalkRecognizer {
    type Input = PoseFrame;

    fn observe_gated(&mut self, frame: &PoseFrame, may_trigger: bool) -> Option<Action> {
        if !self.freshness.admit(frame.capture_ms) {
            return None;
        }
        let now = frame.capture_ms;
        let (lift_left, lift_right) = (knee_lift(frame, Side::Left), knee_lift(frame, Side::Right));
        if !lift_left.is_finite() || !lift_right.is_finite() {
            return None;
        }

        let ready = may_trigger && self.cooldown.ready(now);
        let mut stepped = self.left.step_gated(lift_left, now, ready) == Transition::Triggered;
        if stepped {
            self.cooldown.mark(now);
        }

        // At most one step per frame, left leg first
        let ready = may_trigger && !stepped && self.cooldown.ready(now);
        if self.right.step_gated(lift_right, now, ready) == Transition::Triggered {
            self.cooldown.mark(now);
            stepped = true;
        }

        if stepped {
            self.steps += 1;
            log::debug!("Walk step {} at {} ms", self.steps, now);
            Some(Action::WalkStep)
        } else {
            None
        }
    }

    /// Engaged while either knee is raised
    fn phase(&self) -> Phase {
        match (self.left.phase(), self.right.phase()) {
            (Phase::Idle, Phase::Idle) => Phase::Idle,
            (Phase::Armed, _) | (_, Phase::Armed) => Phase::Armed,
            _ => Phase::Committed,
        }
    }
}
