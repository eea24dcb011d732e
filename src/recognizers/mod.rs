// Gesture recognizers
// One state machine per gesture family, each turning a feature stream into
// zero-or-one action per sample

pub mod attack;
pub mod crouch;
pub mod dash;
pub mod jump;
pub mod machine;
pub mod parry;
pub mod walk;

pub use attack::{AttackConfig, AttackRecognizer};
pub use crouch::{CrouchConfig, CrouchRecognizer};
pub use dash::{
    CameraDashConfig, CameraDashRecognizer, DashConfig, DashForwardConfig, DashForwardRecognizer,
    DashRecognizer,
};
pub use jump::{HipSample, JumpConfig, JumpRecognizer};
pub use machine::{GestureLatch, LatchConfig, Phase, Refractory, Transition};
pub use parry::{ParryConfig, ParryRecognizer};
pub use walk::{WalkConfig, WalkRecognizer};

use crate::events::Action;

/// A gesture family's detector
///
/// Recognizers never fail: malformed or stale input is dropped without
/// touching state.
pub trait Recognizer {
    type Input;

    /// Feed one sample; `may_trigger` = false lets the machine track and
    /// release but never start a new gesture
    fn observe_gated(&mut self, input: &Self::Input, may_trigger: bool) -> Option<Action>;

    fn observe(&mut self, input: &Self::Input) -> Option<Action> {
        self.observe_gated(input, true)
    }

    fn phase(&self) -> Phase;
}
