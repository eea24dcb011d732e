// Axis-Dash recognizers
// Inertial variant: fast roll around the device's X axis
// Camera variant: fast sideways hip translation across a few frames
// Forward variant: head lowered with both hands raised above it

use serde::{Deserialize, Serialize};

use crate::config::{
    check_finite, check_positive, check_unit_interval, check_window, ConfigError,
};
use crate::events::Action;
use crate::features::{ema, span_delta, FeatureWindow, Freshness};
use crate::recognizers::machine::{GestureLatch, LatchConfig, Phase, Transition};
use crate::recognizers::Recognizer;
use crate::sample::{Millis, MotionSample, PoseFrame};

/// Thresholds for gyro-driven dashes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    /// |gyro.x| (rad/s) that triggers a dash
    pub high: f64,

    /// Fixed lockout after a dash; also the re-trigger spacing
    pub cooldown_ms: Millis,
}

impl Default for DashConfig {
    fn default() -> Self {
        DashConfig {
            high: 6.0,
            cooldown_ms: 1000,
        }
    }
}

impl DashConfig {
    pub fn latch(&self) -> LatchConfig {
        LatchConfig {
            start: self.high,
            stop: None,
            refractory_ms: self.cooldown_ms,
            timeout_ms: Some(self.cooldown_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("dash.high", self.high)?;
        self.latch().validate("dash")
    }
}

/// Negative roll pulls the blade toward the body
fn direction_from_roll(roll: f64) -> Action {
    if roll < 0.0 {
        Action::DashIn
    } else {
        Action::DashOut
    }
}

pub struct DashRecognizer {
    freshness: Freshness,
    latch: GestureLatch,
}

impl DashRecognizer {
    pub fn new(config: &DashConfig) -> Self {
        DashRecognizer {
            freshness: Freshness::new(),
            latch: GestureLatch::new(config.latch()),
        }
    }
}

impl Recognizer for DashRecognizer {
    type Input = MotionSample;

    fn observe_gated(&mut self, sample: &MotionSample, may_trigger: bool) -> Option<Action> {
        if !sample.value.is_finite() || !self.freshness.admit(sample.capture_ms) {
            log::debug!("Dash: dropped sample at {} ms", sample.capture_ms);
            return None;
        }

        let roll = sample.value.x;
        match self.latch.step_gated(roll.abs(), sample.capture_ms, may_trigger) {
            Transition::Triggered => {
                let action = direction_from_roll(roll);
                log::debug!("Dash {}: gyro.x {:.2} at {} ms", action, roll, sample.capture_ms);
                Some(action)
            }
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        self.latch.phase()
    }
}

/// Thresholds for camera-driven dashes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDashConfig {
    /// Hip-center x travel (normalized image width) across the window
    pub threshold: f64,

    /// Frames spanned by the travel measurement
    pub frames: usize,

    pub cooldown_ms: Millis,

    /// Action for movement toward larger x; the opposite direction maps to
    /// the other dash
    pub rightward: Action,
}

impl Default for CameraDashConfig {
    fn default() -> Self {
        CameraDashConfig {
            threshold: 0.06,
            frames: 5,
            cooldown_ms: 330,
            rightward: Action::DashIn,
        }
    }
}

impl CameraDashConfig {
    pub fn latch(&self) -> LatchConfig {
        LatchConfig {
            start: self.threshold,
            stop: None,
            refractory_ms: self.cooldown_ms,
            timeout_ms: Some(self.cooldown_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("camera_dash.threshold", self.threshold)?;
        check_positive("camera_dash.threshold", self.threshold)?;
        check_window("camera_dash.frames", self.frames)?;
        if !matches!(self.rightward, Action::DashIn | Action::DashOut) {
            return Err(ConfigError::InvalidAction {
                field: "camera_dash.rightward",
                action: self.rightward,
            });
        }
        self.latch().validate("camera_dash")
    }

    fn leftward(&self) -> Action {
        match self.rightward {
            Action::DashIn => Action::DashOut,
            _ => Action::DashIn,
        }
    }
}

pub struct CameraDashRecognizer {
    config: CameraDashConfig,
    hip_x: FeatureWindow<f64>,
    latch: GestureLatch,
}

impl CameraDashRecognizer {
    pub fn new(config: &CameraDashConfig) -> Self {
        CameraDashRecognizer {
            config: config.clone(),
            hip_x: FeatureWindow::new(config.frames),
            latch: GestureLatch::new(config.latch()),
        }
    }
}

impl Recognizer for CameraDashRecognizer {
    type Input = PoseFrame;

    fn observe_gated(&mut self, frame: &PoseFrame, may_trigger: bool) -> Option<Action> {
        let x = frame.hip_center().x;
        if !x.is_finite() || !self.hip_x.push_at(x, frame.capture_ms) {
            return None;
        }

        // Travel is only meaningful over a full window
        let travel = if self.hip_x.is_full() {
            span_delta(&self.hip_x)
        } else {
            0.0
        };

        match self.latch.step_gated(travel.abs(), frame.capture_ms, may_trigger) {
            Transition::Triggered => {
                let action = if travel > 0.0 {
                    self.config.rightward
                } else {
                    self.config.leftward()
                };
                log::debug!("Camera dash {}: travel {:.3} at {} ms", action, travel, frame.capture_ms);
                Some(action)
            }
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        self.latch.phase()
    }
}

/// Thresholds for the head-down, hands-up forward dash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashForwardConfig {
    /// Smoothing factor for the nose height
    pub head_ema_alpha: f64,

    /// Smoothed nose y beyond which the head counts as lowered
    pub head_low: f64,

    /// Both wrists must sit at least this far above the smoothed nose
    pub hand_margin: f64,

    /// How far the pose must be left before the latch lets go
    pub release_band: f64,

    /// Spacing between dashes while the pose is held
    pub cooldown_ms: Millis,

    pub action: Action,
}

impl Default for DashForwardConfig {
    fn default() -> Self {
        DashForwardConfig {
            head_ema_alpha: 0.3,
            head_low: 0.55,
            hand_margin: 0.05,
            release_band: 0.02,
            cooldown_ms: 500,
            action: Action::DashIn,
        }
    }
}

impl DashForwardConfig {
    /// The latch runs on pose clearance, positive once both conditions hold
    pub fn latch(&self) -> LatchConfig {
        LatchConfig {
            start: 0.0,
            stop: Some(-self.release_band),
            refractory_ms: self.cooldown_ms,
            timeout_ms: Some(self.cooldown_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("dash_forward.head_ema_alpha", self.head_ema_alpha)?;
        check_finite("dash_forward.head_low", self.head_low)?;
        if !(0.0..=1.0).contains(&self.head_low) {
            return Err(ConfigError::OutOfDomain {
                field: "dash_forward.head_low",
                value: self.head_low,
            });
        }
        check_finite("dash_forward.hand_margin", self.hand_margin)?;
        if self.hand_margin < 0.0 {
            return Err(ConfigError::OutOfDomain {
                field: "dash_forward.hand_margin",
                value: self.hand_margin,
            });
        }
        check_positive("dash_forward.release_band", self.release_band)?;
        if !matches!(self.action, Action::DashIn | Action::DashOut) {
            return Err(ConfigError::InvalidAction {
                field: "dash_forward.action",
                action: self.action,
            });
        }
        self.latch().validate("dash_forward")
    }
}

pub struct DashForwardRecognizer {
    config: DashForwardConfig,
    freshness: Freshness,
    head_y: Option<f64>,
    latch: GestureLatch,
}

impl DashForwardRecognizer {
    pub fn new(config: &DashForwardConfig) -> Self {
        DashForwardRecognizer {
            config: config.clone(),
            freshness: Freshness::new(),
            head_y: None,
            latch: GestureLatch::new(config.latch()),
        }
    }

    /// Smoothed nose height; None before the first frame
    pub fn head_y(&self) -> Option<f64> {
        self.head_y
    }
}

impl Recognizer for DashForwardRecognizer {
    type Input = PoseFrame;

    fn observe_gated(&mut self, frame: &PoseFrame, may_trigger: bool) -> Option<Action> {
        let upper = &frame.upper;
        let finite = upper.landmarks().iter().all(|(_, lm)| lm.y.is_finite());
        if !finite || !self.freshness.admit(frame.capture_ms) {
            return None;
        }

        let head = match self.head_y {
            Some(prev) => ema(prev, upper.nose.y, self.config.head_ema_alpha),
            None => upper.nose.y,
        };
        self.head_y = Some(head);

        // y grows downward: a lowered head has a large y, raised hands a small one
        let head_lowered = head - self.config.head_low;
        let highest_wrist = upper.left_wrist.y.max(upper.right_wrist.y);
        let hands_raised = head - self.config.hand_margin - highest_wrist;
        let clearance = head_lowered.min(hands_raised);

        match self.latch.step_gated(clearance, frame.capture_ms, may_trigger) {
            Transition::Triggered => {
                log::debug!("Forward dash: head {:.3} at {} ms", head, frame.capture_ms);
                Some(self.config.action)
            }
            _ => None,
        }
    }

    fn phase(&self) -> Phase {
        self.latch.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Landmark, Leg, UpperBody};

    fn gyro_x(x: f64, t: Millis) -> MotionSample {
        MotionSample::new(x, 0.0, 0.0, t)
    }

    fn hips_at(x: f64, t: Millis) -> PoseFrame {
        let leg = Leg {
            hip: Landmark::new(x, 0.5),
            knee: Landmark::new(x, 0.7),
            ankle: Landmark::new(x, 0.9),
        };
        PoseFrame {
            left: leg,
            right: leg,
            capture_ms: t,
            ..PoseFrame::default()
        }
    }

    fn upper(nose_y: f64, left_wrist_y: f64, right_wrist_y: f64, t: Millis) -> PoseFrame {
        PoseFrame {
            upper: UpperBody {
                nose: Landmark::new(0.5, nose_y),
                left_wrist: Landmark::new(0.4, left_wrist_y),
                right_wrist: Landmark::new(0.6, right_wrist_y),
            },
            capture_ms: t,
            ..hips_at(0.5, t)
        }
    }

    #[test]
    fn test_dash_direction() {
        let mut recognizer = DashRecognizer::new(&DashConfig::default());
        assert_eq!(recognizer.observe(&gyro_x(-9.0, 0)), Some(Action::DashIn));

        let mut recognizer = DashRecognizer::new(&DashConfig::default());
        assert_eq!(recognizer.observe(&gyro_x(9.0, 0)), Some(Action::DashOut));
    }

    #[test]
    fn test_dash_cooldown() {
        let mut recognizer = DashRecognizer::new(&DashConfig::default());

        assert_eq!(recognizer.observe(&gyro_x(-9.0, 0)), Some(Action::DashIn));
        assert_eq!(recognizer.observe(&gyro_x(-9.0, 300)), None);
        assert_eq!(recognizer.observe(&gyro_x(9.0, 900)), None);
        assert_eq!(recognizer.observe(&gyro_x(0.0, 1000)), None);
        assert_eq!(recognizer.phase(), Phase::Idle);
        assert_eq!(recognizer.observe(&gyro_x(9.0, 1100)), Some(Action::DashOut));
    }

    #[test]
    fn test_below_threshold_ignored() {
        let mut recognizer = DashRecognizer::new(&DashConfig::default());
        for t in 0..50 {
            assert_eq!(recognizer.observe(&gyro_x(5.9, t * 20)), None);
        }
    }

    #[test]
    fn test_camera_dash_needs_full_window() {
        let mut recognizer = CameraDashRecognizer::new(&CameraDashConfig::default());

        // Large jump between the first two frames, but the window is not full yet
        assert_eq!(recognizer.observe(&hips_at(0.30, 0)), None);
        assert_eq!(recognizer.observe(&hips_at(0.50, 33)), None);
        assert_eq!(recognizer.observe(&hips_at(0.50, 66)), None);
        assert_eq!(recognizer.observe(&hips_at(0.50, 99)), None);

        // Fifth frame: window spans 0.30 -> 0.50
        assert_eq!(recognizer.observe(&hips_at(0.50, 132)), Some(Action::DashIn));
    }

    #[test]
    fn test_camera_dash_leftward() {
        let mut recognizer = CameraDashRecognizer::new(&CameraDashConfig::default());
        let mut fired = Vec::new();

        for (i, x) in [0.60, 0.58, 0.55, 0.52, 0.50, 0.50, 0.50].iter().enumerate() {
            if let Some(action) = recognizer.observe(&hips_at(*x, i as Millis * 33)) {
                fired.push(action);
            }
        }

        assert_eq!(fired, vec![Action::DashOut]);
    }

    #[test]
    fn test_camera_dash_rightward_mapping() {
        let config = CameraDashConfig {
            rightward: Action::DashOut,
            ..CameraDashConfig::default()
        };
        let mut recognizer = CameraDashRecognizer::new(&config);

        let mut fired = None;
        for (i, x) in [0.40, 0.43, 0.46, 0.49, 0.52].iter().enumerate() {
            fired = fired.or(recognizer.observe(&hips_at(*x, i as Millis * 33)));
        }

        assert_eq!(fired, Some(Action::DashOut));
    }

    #[test]
    fn test_camera_dash_rejects_non_dash_mapping() {
        let config = CameraDashConfig {
            rightward: Action::Jump,
            ..CameraDashConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dash_forward_waits_for_smoothed_head() {
        let mut recognizer = DashForwardRecognizer::new(&DashForwardConfig::default());

        // Upright, hands down
        assert_eq!(recognizer.observe(&upper(0.2, 0.6, 0.6, 0)), None);

        // Ducks and raises both hands; the smoothed head lags behind the nose
        let fired: Vec<Option<Action>> = (1..=4)
            .map(|i| recognizer.observe(&upper(0.7, 0.4, 0.4, i * 33)))
            .collect();

        assert_eq!(fired, vec![None, None, None, Some(Action::DashIn)]);
        assert!(recognizer.head_y().unwrap() > 0.55);
    }

    #[test]
    fn test_dash_forward_needs_both_hands() {
        let mut recognizer = DashForwardRecognizer::new(&DashForwardConfig::default());

        for i in 0..20 {
            assert_eq!(recognizer.observe(&upper(0.7, 0.4, 0.8, i * 33)), None);
        }
        assert_eq!(recognizer.phase(), Phase::Idle);
    }

    #[test]
    fn test_dash_forward_repeats_after_cooldown_while_held() {
        let mut recognizer = DashForwardRecognizer::new(&DashForwardConfig::default());

        let fired: Vec<u64> = (0..18)
            .filter(|i| recognizer.observe(&upper(0.7, 0.4, 0.4, i * 33)).is_some())
            .collect();

        // Released by the 500 ms timeout at frame 16, re-triggered on the next
        assert_eq!(fired, vec![0, 17]);
    }

    #[test]
    fn test_dash_forward_releases_when_pose_dropped() {
        let mut recognizer = DashForwardRecognizer::new(&DashForwardConfig::default());

        assert_eq!(recognizer.observe(&upper(0.7, 0.4, 0.4, 0)), Some(Action::DashIn));
        recognizer.observe(&upper(0.2, 0.6, 0.6, 33));
        assert_eq!(recognizer.phase(), Phase::Idle);
    }

    #[test]
    fn test_dash_forward_action_is_configurable() {
        let config = DashForwardConfig {
            action: Action::DashOut,
            ..DashForwardConfig::default()
        };
        let mut recognizer = DashForwardRecognizer::new(&config);
        assert_eq!(recognizer.observe(&upper(0.7, 0.4, 0.4, 0)), Some(Action::DashOut));

        let config = DashForwardConfig {
            action: Action::Crouch,
            ..DashForwardConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAction { field: "dash_forward.action", .. })
        ));
    }
}
