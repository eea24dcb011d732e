// Cross-source arbitration
// Collapses same-action proposals from several sources into one event per
// cooldown window, preferring the source kind configured for each action

pub mod policy;

pub use policy::{ActionPolicy, ArbiterConfig};

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::events::{Action, ActionEvent, Proposal, SourceId, SourceKind};
use crate::sample::Millis;

/// Why a proposal produced no event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Same action was published too recently
    Cooldown,

    /// A proposal of equal or higher priority is already pending
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(ActionEvent),

    /// Held back waiting for the preferred source
    Deferred,

    Dropped(DropReason),
}

/// Result of one `submit`
#[derive(Debug, Clone, PartialEq)]
pub struct Arbitration {
    pub verdict: Verdict,

    /// Earlier deferred proposals whose window elapsed before this one
    pub released: Vec<ActionEvent>,
}

impl Arbitration {
    /// Every event to publish, oldest first
    pub fn events(&self) -> Vec<ActionEvent> {
        let mut events = self.released.clone();
        if let Verdict::Accepted(event) = &self.verdict {
            events.push(event.clone());
        }
        events
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted(_))
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    proposal: Proposal,
    deadline_ms: Millis,
}

#[derive(Debug, Default)]
struct ArbitrationState {
    last_winner: HashMap<Action, SourceId>,
    last_emit_ms: HashMap<Action, Millis>,
    pending: HashMap<Action, Pending>,
    registered: HashMap<SourceKind, usize>,
}

impl ArbitrationState {
    fn cooling_down(&self, action: Action, now_ms: Millis, cooldown_ms: Millis) -> bool {
        self.last_emit_ms
            .get(&action)
            .map_or(false, |last| now_ms.saturating_sub(*last) < cooldown_ms)
    }

    fn accept(&mut self, proposal: &Proposal) -> ActionEvent {
        self.last_emit_ms.insert(proposal.action, proposal.timestamp_ms);
        self.last_winner.insert(proposal.action, proposal.source);
        let event = ActionEvent::from_proposal(proposal);
        log::info!(
            "Action {} from {} at {} ms",
            event.action,
            event.source,
            event.timestamp_ms
        );
        event
    }
}

/// Process-wide arbitrator; every decision is made under one lock
pub struct Arbitrator {
    config: ArbiterConfig,
    state: Mutex<ArbitrationState>,
}

impl Arbitrator {
    pub fn new(config: ArbiterConfig) -> Self {
        Arbitrator {
            config,
            state: Mutex::new(ArbitrationState::default()),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    // State stays consistent across a panic elsewhere, so a poisoned lock is reused
    fn lock(&self) -> MutexGuard<'_, ArbitrationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide one proposal
    pub fn submit(&self, proposal: Proposal) -> Arbitration {
        let mut state = self.lock();
        let now = proposal.timestamp_ms;
        let released = self.release_expired(&mut state, now);

        let policy = self.config.policy(proposal.action);
        let verdict = if state.cooling_down(proposal.action, now, policy.cooldown_ms) {
            log::debug!(
                "Dropped {} from {}: cooling down",
                proposal.action,
                proposal.source
            );
            Verdict::Dropped(DropReason::Cooldown)
        } else if let Some(pending) = state.pending.get(&proposal.action).copied() {
            let incoming = policy.priority(proposal.source.kind);
            let held = policy.priority(pending.proposal.source.kind);
            if incoming > held {
                state.pending.remove(&proposal.action);
                log::debug!(
                    "{} from {} supersedes {}",
                    proposal.action,
                    proposal.source,
                    pending.proposal.source
                );
                Verdict::Accepted(state.accept(&proposal))
            } else {
                log::debug!(
                    "Dropped {} from {}: {} already pending",
                    proposal.action,
                    proposal.source,
                    pending.proposal.source
                );
                Verdict::Dropped(DropReason::Duplicate)
            }
        } else if self.should_defer(&state, &policy, proposal.source.kind) {
            state.pending.insert(
                proposal.action,
                Pending {
                    proposal,
                    deadline_ms: now.saturating_add(self.config.arbitration_window_ms),
                },
            );
            Verdict::Deferred
        } else {
            Verdict::Accepted(state.accept(&proposal))
        };

        Arbitration { verdict, released }
    }

    /// Release deferred proposals whose window has elapsed by `now_ms`
    pub fn poll(&self, now_ms: Millis) -> Vec<ActionEvent> {
        let mut state = self.lock();
        self.release_expired(&mut state, now_ms)
    }

    fn should_defer(&self, state: &ArbitrationState, policy: &ActionPolicy, kind: SourceKind) -> bool {
        if self.config.arbitration_window_ms == 0 {
            return false;
        }
        match policy.preferred {
            Some(preferred) if preferred != kind => {
                state.registered.get(&preferred).copied().unwrap_or(0) > 0
            }
            _ => false,
        }
    }

    fn release_expired(&self, state: &mut ArbitrationState, now_ms: Millis) -> Vec<ActionEvent> {
        let mut expired: Vec<Pending> = state
            .pending
            .values()
            .filter(|p| p.deadline_ms <= now_ms)
            .copied()
            .collect();
        if expired.is_empty() {
            return Vec::new();
        }
        expired.sort_by_key(|p| p.proposal.timestamp_ms);

        let mut released = Vec::with_capacity(expired.len());
        for pending in expired {
            let proposal = pending.proposal;
            state.pending.remove(&proposal.action);

            let cooldown = self.config.policy(proposal.action).cooldown_ms;
            if state.cooling_down(proposal.action, proposal.timestamp_ms, cooldown) {
                log::debug!("Deferred {} from {} expired in cooldown", proposal.action, proposal.source);
                continue;
            }
            released.push(state.accept(&proposal));
        }
        released
    }

    pub fn register_source(&self, kind: SourceKind) {
        *self.lock().registered.entry(kind).or_insert(0) += 1;
    }

    pub fn unregister_source(&self, kind: SourceKind) {
        let mut state = self.lock();
        if let Some(count) = state.registered.get_mut(&kind) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn registered(&self, kind: SourceKind) -> usize {
        self.lock().registered.get(&kind).copied().unwrap_or(0)
    }

    pub fn last_winner(&self, action: Action) -> Option<SourceId> {
        self.lock().last_winner.get(&action).copied()
    }

    pub fn last_emit_ms(&self, action: Action) -> Option<Millis> {
        self.lock().last_emit_ms.get(&action).copied()
    }

    pub fn pending(&self, action: Action) -> Option<Proposal> {
        self.lock().pending.get(&action).map(|p| p.proposal)
    }
}
