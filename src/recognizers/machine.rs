// Gesture state machine
// Shared Idle -> Armed -> Committed -> Idle latch with hysteresis,
// refractory period and commit-lock

use serde::{Deserialize, Serialize};

use crate::config::{check_finite, check_hysteresis, ConfigError};
use crate::sample::Millis;

/// Phase of one gesture family's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for the start threshold
    Idle,

    /// Triggered on this motion; the proposal has been emitted
    Armed,

    /// Motion still ongoing after the trigger; re-emission is locked out
    Committed,
}

impl Phase {
    /// True while a motion episode is in progress
    pub fn is_engaged(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

/// Outcome of feeding one sample to a latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No edge on this sample
    Hold,

    /// Idle -> Armed; the caller emits its proposal now
    Triggered,

    /// Armed/Committed -> Idle
    Released,
}

/// Minimum spacing between triggers, with an extendable deadline
#[derive(Debug, Clone)]
pub struct Refractory {
    period_ms: Millis,
    last_trigger_ms: Option<Millis>,
    until_ms: Millis,
}

impl Refractory {
    pub fn new(period_ms: Millis) -> Self {
        Refractory {
            period_ms,
            last_trigger_ms: None,
            until_ms: 0,
        }
    }

    /// True once the deadline has passed
    pub fn ready(&self, now_ms: Millis) -> bool {
        self.last_trigger_ms.is_none() || now_ms >= self.until_ms
    }

    /// Record a trigger and start a fresh period
    pub fn mark(&mut self, now_ms: Millis) {
        self.last_trigger_ms = Some(now_ms);
        self.until_ms = now_ms.saturating_add(self.period_ms);
    }

    /// Push the deadline out to at least `now + min_ms`
    pub fn extend(&mut self, now_ms: Millis, min_ms: Millis) {
        if self.last_trigger_ms.is_none() {
            self.last_trigger_ms = Some(now_ms);
        }
        self.until_ms = self.until_ms.max(now_ms.saturating_add(min_ms));
    }

    pub fn last_trigger_ms(&self) -> Option<Millis> {
        self.last_trigger_ms
    }

    pub fn until_ms(&self) -> Millis {
        self.until_ms
    }
}

/// Thresholds and timers for a single-feature latch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatchConfig {
    /// Feature must exceed this to trigger
    pub start: f64,

    /// Feature falling below this releases the latch; must be < start
    /// None means only the timeout releases
    pub stop: Option<f64>,

    /// Minimum time between triggers
    pub refractory_ms: Millis,

    /// Release this long after the trigger regardless of the feature
    pub timeout_ms: Option<Millis>,
}

impl LatchConfig {
    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        check_finite(field, self.start)?;
        if let Some(stop) = self.stop {
            check_finite(field, stop)?;
            check_hysteresis(field, self.start, stop)?;
        }
        if self.stop.is_none() && self.timeout_ms.is_none() {
            return Err(ConfigError::NoRelease { field });
        }
        Ok(())
    }
}

/// Hysteresis latch over one scalar feature
#[derive(Debug, Clone)]
pub struct GestureLatch {
    config: LatchConfig,
    phase: Phase,
    refractory: Refractory,
    armed_at_ms: Millis,
}

impl GestureLatch {
    pub fn new(config: LatchConfig) -> Self {
        GestureLatch {
            config,
            phase: Phase::Idle,
            refractory: Refractory::new(config.refractory_ms),
            armed_at_ms: 0,
        }
    }

    pub fn step(&mut self, level: f64, now_ms: Millis) -> Transition {
        self.step_gated(level, now_ms, true)
    }

    /// Advance the machine by one sample
    /// `may_trigger` = false keeps an idle latch idle but still lets an
    /// engaged latch release
    pub fn step_gated(&mut self, level: f64, now_ms: Millis, may_trigger: bool) -> Transition {
        match self.phase {
            Phase::Idle => {
                if may_trigger && level > self.config.start && self.refractory.ready(now_ms) {
                    self.phase = Phase::Armed;
                    self.armed_at_ms = now_ms;
                    self.refractory.mark(now_ms);
                    Transition::Triggered
                } else {
                    Transition::Hold
                }
            }
            Phase::Armed | Phase::Committed => {
                let timed_out = self
                    .config
                    .timeout_ms
                    .map_or(false, |t| now_ms.saturating_sub(self.armed_at_ms) >= t);
                let below = self.config.stop.map_or(false, |stop| level < stop);

                if timed_out || below {
                    self.phase = Phase::Idle;
                    Transition::Released
                } else {
                    self.phase = Phase::Committed;
                    Transition::Hold
                }
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_engaged(&self) -> bool {
        self.phase.is_engaged()
    }

    pub fn last_trigger_ms(&self) -> Option<Millis> {
        self.refractory.last_trigger_ms()
    }

    pub fn config(&self) -> &LatchConfig {
        &self.config
    }
}
