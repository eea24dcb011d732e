// Action event types
// Defines the action alphabet, source identity, proposals and published events

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sample::Millis;

/// Discrete actions the core can emit
/// Mapping each action to a concrete key or mouse effect belongs to the effector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Sharp swing of the handheld device
    Attack,

    /// Wrist twist around the device's Y axis
    Parry,

    /// Attack performed while the combat-art modifier is active
    CombatArt,

    /// Dash toward the opponent
    DashIn,

    /// Dash away from the opponent
    DashOut,

    Jump,

    /// Level-triggered; repeats for as long as the player stays crouched
    Crouch,

    /// One knee raise while walking in place
    WalkStep,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Attack,
        Action::Parry,
        Action::CombatArt,
        Action::DashIn,
        Action::DashOut,
        Action::Jump,
        Action::Crouch,
        Action::WalkStep,
    ];

    /// Parse the snake_case wire name
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "attack" => Some(Action::Attack),
            "parry" => Some(Action::Parry),
            "combat_art" => Some(Action::CombatArt),
            "dash_in" => Some(Action::DashIn),
            "dash_out" => Some(Action::DashOut),
            "jump" => Some(Action::Jump),
            "crouch" => Some(Action::Crouch),
            "walk_step" => Some(Action::WalkStep),
            _ => None,
        }
    }

    /// snake_case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Attack => "attack",
            Action::Parry => "parry",
            Action::CombatArt => "combat_art",
            Action::DashIn => "dash_in",
            Action::DashOut => "dash_out",
            Action::Jump => "jump",
            Action::Crouch => "crouch",
            Action::WalkStep => "walk_step",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensing modality a source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Handheld device streaming accelerometer, gyroscope and buttons
    Inertial,

    /// Camera pose loop
    Camera,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Inertial => "inertial",
            SourceKind::Camera => "camera",
        }
    }
}

/// Identity of one connected source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub kind: SourceKind,
    pub index: u16,
}

impl SourceId {
    pub const fn new(kind: SourceKind, index: u16) -> Self {
        SourceId { kind, index }
    }

    pub const fn inertial(index: u16) -> Self {
        Self::new(SourceKind::Inertial, index)
    }

    pub const fn camera(index: u16) -> Self {
        Self::new(SourceKind::Camera, index)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind.as_str(), self.index)
    }
}

/// A recognizer's claim that an action happened, awaiting arbitration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub action: Action,
    pub source: SourceId,

    /// Arbitration time in milliseconds on the engine clock
    pub timestamp_ms: Millis,
}

impl Proposal {
    pub fn new(action: Action, source: SourceId, timestamp_ms: Millis) -> Self {
        Proposal {
            action,
            source,
            timestamp_ms,
        }
    }
}

/// An accepted action, published to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    pub action: Action,

    /// Source whose proposal won arbitration
    pub source: SourceId,

    /// Arbitration time in milliseconds on the engine clock
    pub timestamp_ms: Millis,
}

impl ActionEvent {
    /// Create a new event with generated UUID
    pub fn new(action: Action, source: SourceId, timestamp_ms: Millis) -> Self {
        ActionEvent {
            id: Uuid::new_v4(),
            action,
            source,
            timestamp_ms,
        }
    }

    pub fn from_proposal(proposal: &Proposal) -> Self {
        Self::new(proposal.action, proposal.source, proposal.timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_string(action.as_str()), Some(action));
        }
        assert_eq!(Action::from_string("reset_position"), None);
    }

    #[test]
    fn test_action_serializes_snake_case() {
        let json = serde_json::to_string(&Action::CombatArt).unwrap();
        assert_eq!(json, "\"combat_art\"");

        let parsed: Action = serde_json::from_str("\"walk_step\"").unwrap();
        assert_eq!(parsed, Action::WalkStep);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(SourceId::inertial(0).to_string(), "inertial#0");
        assert_eq!(SourceId::camera(3).to_string(), "camera#3");
    }

    #[test]
    fn test_event_creation() {
        let proposal = Proposal::new(Action::Parry, SourceId::inertial(1), 420);
        let event = ActionEvent::from_proposal(&proposal);
        let other = ActionEvent::from_proposal(&proposal);

        assert_eq!(event.action, Action::Parry);
        assert_eq!(event.source, SourceId::inertial(1));
        assert_eq!(event.timestamp_ms, 420);
        assert_ne!(event.id, other.id);
    }
}
