use std::time::Duration;

use tokio::time::Instant;

use crate::storage::entities::DistractionKind;

use super::{
    activity::ActivitySignal,
    distraction::{rounded_seconds, DistractionRecord},
};

pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_millis(300_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    Active,
    Idle { since: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    Entered,
    Left { lasted: Duration },
}

impl IdleTransition {
    pub fn record(&self) -> DistractionRecord {
        match *self {
            IdleTransition::Entered => DistractionRecord {
                kind: DistractionKind::Idle,
                duration: Duration::ZERO,
                notes: "User went idle".into(),
            },
            IdleTransition::Left { lasted } => DistractionRecord {
                kind: DistractionKind::Idle,
                duration: lasted,
                notes: format!(
                    "User returned from idle state after {} seconds",
                    rounded_seconds(lasted)
                ),
            },
        }
    }
}

/// Single watchdog over every kind of input. Unlike the distraction detector it does not care
/// which channel was used, only that something happened within the threshold.
#[derive(Debug)]
pub struct IdleDetector {
    threshold: Duration,
    deadline: Option<Instant>,
    state: IdleState,
}

impl IdleDetector {
    /// The watchdog starts armed from `now`.
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            deadline: Some(now + threshold),
            state: IdleState::Active,
        }
    }

    pub fn state(&self) -> IdleState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, IdleState::Idle { .. })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Re-arms the watchdog on any input, and leaves the idle state if the user was away.
    pub fn observe(&mut self, signal: ActivitySignal, now: Instant) -> Option<IdleTransition> {
        if !signal.is_input() {
            return None;
        }
        self.deadline = Some(now + self.threshold);
        match self.state {
            IdleState::Active => None,
            IdleState::Idle { since } => {
                self.state = IdleState::Active;
                Some(IdleTransition::Left { lasted: now - since })
            }
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<IdleTransition> {
        match (self.state, self.deadline) {
            (IdleState::Active, Some(deadline)) if now >= deadline => {
                self.deadline = None;
                self.state = IdleState::Idle { since: now };
                Some(IdleTransition::Entered)
            }
            _ => None,
        }
    }
}
