// Arbitration policy
// Per-action cooldowns and preferred source kinds

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ConfigError;
use crate::events::{Action, SourceKind};
use crate::sample::Millis;

/// Longest deferral window accepted by validation
const MAX_ARBITRATION_WINDOW_MS: Millis = 1000;

/// How one action is arbitrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    /// Minimum spacing between two published events of this action
    pub cooldown_ms: Millis,

    /// Source kind whose proposals outrank the others
    pub preferred: Option<SourceKind>,
}

impl ActionPolicy {
    pub const fn new(cooldown_ms: Millis, preferred: Option<SourceKind>) -> Self {
        ActionPolicy {
            cooldown_ms,
            preferred,
        }
    }

    /// 1 for the preferred kind, 0 for everything else
    pub fn priority(&self, kind: SourceKind) -> u8 {
        match self.preferred {
            Some(preferred) if preferred == kind => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// How long a lower-priority proposal waits for a preferred source
    pub arbitration_window_ms: Millis,

    /// Cooldown for actions without an explicit policy
    pub default_cooldown_ms: Millis,

    pub policies: HashMap<Action, ActionPolicy>,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        let camera = Some(SourceKind::Camera);
        let inertial = Some(SourceKind::Inertial);

        let policies = HashMap::from([
            (Action::DashIn, ActionPolicy::new(120, camera)),
            (Action::DashOut, ActionPolicy::new(120, camera)),
            (Action::Crouch, ActionPolicy::new(100, camera)),
            (Action::Jump, ActionPolicy::new(180, inertial)),
            (Action::Attack, ActionPolicy::new(80, inertial)),
            (Action::Parry, ActionPolicy::new(100, inertial)),
            (Action::CombatArt, ActionPolicy::new(80, inertial)),
            (Action::WalkStep, ActionPolicy::new(150, None)),
        ]);

        ArbiterConfig {
            arbitration_window_ms: 60,
            default_cooldown_ms: 100,
            policies,
        }
    }
}

impl ArbiterConfig {
    pub fn policy(&self, action: Action) -> ActionPolicy {
        self.policies
            .get(&action)
            .copied()
            .unwrap_or(ActionPolicy::new(self.default_cooldown_ms, None))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arbitration_window_ms > MAX_ARBITRATION_WINDOW_MS {
            return Err(ConfigError::OutOfDomain {
                field: "arbiter.arbitration_window_ms",
                value: self.arbitration_window_ms as f64,
            });
        }
        Ok(())
    }
}
