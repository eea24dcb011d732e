// Per-source sessions
// Bundle one source's recognizers, route typed samples to them and stamp the
// resulting proposals with the engine clock

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{ConfigError, EngineConfig};
use crate::events::{Action, Proposal, SourceId};
use crate::recognizers::{
    AttackRecognizer, CameraDashRecognizer, CrouchRecognizer, DashForwardRecognizer,
    DashRecognizer, HipSample, JumpRecognizer, ParryRecognizer, Recognizer, WalkRecognizer,
};
use crate::sample::{
    validate_pose, ButtonEdge, InertialSample, Millis, MotionSample, OrientationSample, PoseFrame,
};

/// How the combat-art button drives the modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComboMode {
    /// Each press flips the modifier
    #[default]
    Toggle,

    /// Active between press and release
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Button code -> action proposed on press
    pub bindings: HashMap<u32, Action>,

    /// Button acting as the combat-art modifier
    pub combo_button: Option<u32>,

    pub combo_mode: ComboMode,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        ButtonConfig {
            // Android volume-down / volume-up key codes
            bindings: HashMap::from([(25, Action::Parry), (24, Action::Jump)]),
            combo_button: None,
            combo_mode: ComboMode::Toggle,
        }
    }
}

impl ButtonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // A modifier that also proposes an action would do both on every press
        if let Some(action) = self.combo_button.and_then(|code| self.bindings.get(&code)) {
            return Err(ConfigError::InvalidAction {
                field: "buttons.combo_button",
                action: *action,
            });
        }
        Ok(())
    }
}

/// Recognizers for one handheld device
pub struct InertialSession {
    source: SourceId,
    attack: AttackRecognizer,
    parry: ParryRecognizer,
    dash: DashRecognizer,
    exclusive: bool,
    buttons: ButtonConfig,
    combo_active: bool,
    orientation: Option<OrientationSample>,
}

impl InertialSession {
    pub fn new(source: SourceId, config: &EngineConfig) -> Self {
        InertialSession {
            source,
            attack: AttackRecognizer::new(&config.attack),
            parry: ParryRecognizer::new(&config.parry),
            dash: DashRecognizer::new(&config.dash),
            exclusive: config.exclusive_motion,
            buttons: config.buttons.clone(),
            combo_active: false,
            orientation: None,
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Whether attacks are currently relabelled as combat arts
    pub fn combo_active(&self) -> bool {
        self.combo_active
    }

    /// Most recent valid orientation
    pub fn orientation(&self) -> Option<OrientationSample> {
        self.orientation
    }

    /// Route one sample; `received_ms` is the engine clock at arrival
    pub fn handle(&mut self, sample: &InertialSample, received_ms: Millis) -> Vec<Proposal> {
        let actions: Vec<Action> = match sample {
            InertialSample::Accel(accel) => self.on_accel(accel).into_iter().collect(),
            InertialSample::Gyro(gyro) => self.on_gyro(gyro),
            InertialSample::Orientation(orientation) => {
                self.on_orientation(orientation);
                Vec::new()
            }
            InertialSample::Button(edge) => self.on_button(edge).into_iter().collect(),
        };

        actions
            .into_iter()
            .map(|action| Proposal::new(action, self.source, received_ms))
            .collect()
    }

    fn on_accel(&mut self, accel: &MotionSample) -> Option<Action> {
        let gate = !self.exclusive || !self.parry.phase().is_engaged();
        let action = self.attack.observe_gated(accel, gate)?;
        if self.combo_active {
            Some(Action::CombatArt)
        } else {
            Some(action)
        }
    }

    fn on_gyro(&mut self, gyro: &MotionSample) -> Vec<Action> {
        let mut actions = Vec::new();

        let gate = !self.exclusive || !self.attack.phase().is_engaged();
        actions.extend(self.parry.observe_gated(gyro, gate));

        let gate = !self.exclusive
            || !(self.attack.phase().is_engaged() || self.parry.phase().is_engaged());
        actions.extend(self.dash.observe_gated(gyro, gate));

        actions
    }

    fn on_orientation(&mut self, orientation: &OrientationSample) {
        let newer = self
            .orientation
            .map_or(true, |current| orientation.capture_ms >= current.capture_ms);
        if newer {
            self.orientation = Some(*orientation);
        }
    }

    fn on_button(&mut self, edge: &ButtonEdge) -> Option<Action> {
        if self.buttons.combo_button == Some(edge.code) {
            self.combo_active = match self.buttons.combo_mode {
                ComboMode::Toggle if edge.pressed => !self.combo_active,
                ComboMode::Toggle => self.combo_active,
                ComboMode::Hold => edge.pressed,
            };
            log::debug!("{}: combat-art modifier {}", self.source, self.combo_active);
            return None;
        }

        if !edge.pressed {
            return None;
        }
        let action = self.buttons.bindings.get(&edge.code).copied();
        if action.is_none() {
            log::debug!("{}: unbound button {}", self.source, edge.code);
        }
        action
    }
}

/// Recognizers for one camera's pose stream
pub struct PoseSession {
    source: SourceId,
    landmark_margin: f64,
    crouch: CrouchRecognizer,
    dash: CameraDashRecognizer,
    dash_forward: DashForwardRecognizer,
    jump: JumpRecognizer,
    walk: WalkRecognizer,
}

impl PoseSession {
    pub fn new(source: SourceId, config: &EngineConfig) -> Self {
        PoseSession {
            source,
            landmark_margin: config.landmark_margin,
            crouch: CrouchRecognizer::new(&config.crouch),
            dash: CameraDashRecognizer::new(&config.camera_dash),
            dash_forward: DashForwardRecognizer::new(&config.dash_forward),
            jump: JumpRecognizer::new(&config.jump),
            walk: WalkRecognizer::new(&config.walk),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn is_crouching(&self) -> bool {
        self.crouch.is_crouching()
    }

    pub fn jump_baseline(&self) -> Option<f64> {
        self.jump.baseline()
    }

    /// Route one frame; out-of-range frames are dropped before any recognizer
    /// sees them
    pub fn handle(&mut self, frame: &PoseFrame, received_ms: Millis) -> Vec<Proposal> {
        if let Err(e) = validate_pose(frame, self.landmark_margin) {
            log::debug!("{}: dropped frame at {} ms: {}", self.source, frame.capture_ms, e);
            return Vec::new();
        }

        let mut actions = Vec::new();
        actions.extend(self.crouch.observe(frame));
        actions.extend(self.dash.observe(frame));
        actions.extend(self.dash_forward.observe(frame));

        let hip = HipSample {
            y: frame.hip_center().y,
            crouching: self.crouch.is_crouching(),
            capture_ms: frame.capture_ms,
        };
        actions.extend(self.jump.observe(&hip));
        actions.extend(self.walk.observe(frame));

        actions
            .into_iter()
            .map(|action| Proposal::new(action, self.source, received_ms))
            .collect()
    }
}
