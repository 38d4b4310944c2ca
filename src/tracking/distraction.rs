//! Per-channel attention tracking.
//!
//! Pointer and keyboard activity each have a watchdog that fires when the channel stays silent
//! for its threshold. Visibility is edge-triggered: hiding the page is an immediate app switch.
//! Only one reason is public at a time. The first channel to lapse becomes the reason; channels
//! that lapse while it is active wait in order and take over once it clears, if they are still
//! silent by then.

use std::time::Duration;

use tokio::time::Instant;

use crate::storage::entities::DistractionKind;

use super::activity::{ActivitySignal, Channel, Visibility};

pub const DEFAULT_MOUSE_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(60);
pub const DEFAULT_KEYBOARD_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    pub mouse_threshold: Duration,
    pub keyboard_threshold: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mouse_threshold: DEFAULT_MOUSE_INACTIVITY_THRESHOLD,
            keyboard_threshold: DEFAULT_KEYBOARD_INACTIVITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionState {
    Attentive,
    Distracted {
        reason: DistractionKind,
        since: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistractionTransition {
    Began { reason: DistractionKind },
    Ended { reason: DistractionKind, lasted: Duration },
}

/// What gets appended to the open session for a transition or a manual report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistractionRecord {
    pub kind: DistractionKind,
    pub duration: Duration,
    pub notes: String,
}

impl DistractionTransition {
    pub fn record(&self) -> DistractionRecord {
        match *self {
            DistractionTransition::Began { reason } => DistractionRecord {
                kind: reason,
                duration: Duration::ZERO,
                notes: onset_note(reason).into(),
            },
            DistractionTransition::Ended { reason, lasted } => DistractionRecord {
                kind: reason,
                duration: lasted,
                notes: format!("{reason} ended after {} seconds", rounded_seconds(lasted)),
            },
        }
    }
}

fn onset_note(reason: DistractionKind) -> &'static str {
    match reason {
        DistractionKind::MouseInactivity => "Mouse inactive for too long",
        DistractionKind::TypingInactivity => "Keyboard inactive for too long",
        DistractionKind::AppSwitch => "Switched to another app or tab",
        DistractionKind::Idle => "User went idle",
        DistractionKind::Manual => "Manually recorded distraction",
    }
}

pub(crate) fn rounded_seconds(duration: Duration) -> u64 {
    (duration.as_millis() as f64 / 1000.).round() as u64
}

impl Channel {
    fn reason(&self) -> DistractionKind {
        match self {
            Channel::Pointer => DistractionKind::MouseInactivity,
            Channel::Keyboard => DistractionKind::TypingInactivity,
            Channel::Visibility => DistractionKind::AppSwitch,
        }
    }
}

#[derive(Debug)]
struct Watchdog {
    threshold: Duration,
    last_seen: Option<Instant>,
    deadline: Option<Instant>,
    lapsed: bool,
}

impl Watchdog {
    fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_seen: None,
            deadline: None,
            lapsed: false,
        }
    }

    fn arm(&mut self, now: Instant) {
        self.last_seen = Some(now);
        self.deadline = Some(now + self.threshold);
        self.lapsed = false;
    }

    fn disarm(&mut self) {
        self.deadline = None;
        self.lapsed = false;
    }

    /// Fires at most once per arming.
    fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.lapsed = true;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct DistractionDetector {
    enabled: bool,
    pointer: Watchdog,
    keyboard: Watchdog,
    hidden: bool,
    state: AttentionState,
    pending: Vec<Channel>,
}

impl DistractionDetector {
    /// Starts disabled; nothing is detected until [DistractionDetector::set_enabled].
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            enabled: false,
            pointer: Watchdog::new(config.mouse_threshold),
            keyboard: Watchdog::new(config.keyboard_threshold),
            hidden: false,
            state: AttentionState::Attentive,
            pending: vec![],
        }
    }

    pub fn state(&self) -> AttentionState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_distracted(&self) -> bool {
        matches!(self.state, AttentionState::Distracted { .. })
    }

    pub fn reason(&self) -> Option<DistractionKind> {
        match self.state {
            AttentionState::Attentive => None,
            AttentionState::Distracted { reason, .. } => Some(reason),
        }
    }

    /// Last activity seen on a channel while enabled.
    pub fn last_seen(&self, channel: Channel) -> Option<Instant> {
        match channel {
            Channel::Pointer => self.pointer.last_seen,
            Channel::Keyboard => self.keyboard.last_seen,
            Channel::Visibility => None,
        }
    }

    /// Earliest instant at which [DistractionDetector::poll] can produce a transition.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.enabled {
            return None;
        }
        match (self.pointer.deadline, self.keyboard.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Enabling arms both watchdogs from `now`. Disabling disarms them and closes an active
    /// distraction so the log is left without a dangling onset.
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) -> Vec<DistractionTransition> {
        let mut transitions = vec![];
        if enabled == self.enabled {
            return transitions;
        }
        self.enabled = enabled;

        if enabled {
            self.pointer.arm(now);
            self.keyboard.arm(now);
            if self.hidden {
                self.lapse(Channel::Visibility, now, &mut transitions);
            }
        } else {
            self.pointer.disarm();
            self.keyboard.disarm();
            self.pending.clear();
            if let AttentionState::Distracted { reason, since } = self.state {
                transitions.push(DistractionTransition::Ended {
                    reason,
                    lasted: now - since,
                });
                self.state = AttentionState::Attentive;
            }
        }
        transitions
    }

    pub fn observe(&mut self, signal: ActivitySignal, now: Instant) -> Vec<DistractionTransition> {
        let mut transitions = vec![];
        let Some(channel) = signal.channel() else {
            return transitions;
        };

        if let ActivitySignal::Visibility(visibility) = signal {
            let hidden = visibility == Visibility::Hidden;
            if hidden == self.hidden {
                return transitions;
            }
            self.hidden = hidden;
            if !self.enabled {
                return transitions;
            }
            if hidden {
                self.lapse(Channel::Visibility, now, &mut transitions);
            } else {
                self.recover(Channel::Visibility, now, &mut transitions);
            }
            return transitions;
        }

        if !self.enabled {
            return transitions;
        }
        match channel {
            Channel::Pointer => self.pointer.arm(now),
            Channel::Keyboard => self.keyboard.arm(now),
            Channel::Visibility => {}
        }
        self.recover(channel, now, &mut transitions);
        transitions
    }

    /// Fires every watchdog whose deadline has passed, earliest first.
    pub fn poll(&mut self, now: Instant) -> Vec<DistractionTransition> {
        let mut transitions = vec![];
        if !self.enabled {
            return transitions;
        }

        let mut expired = vec![];
        for (channel, watchdog) in [
            (Channel::Pointer, &mut self.pointer),
            (Channel::Keyboard, &mut self.keyboard),
        ] {
            let deadline = watchdog.deadline;
            if watchdog.expire(now) {
                expired.push((deadline, channel));
            }
        }
        expired.sort_by_key(|(deadline, _)| *deadline);

        for (_, channel) in expired {
            self.lapse(channel, now, &mut transitions);
        }
        transitions
    }

    /// Record for a distraction the user reported. Leaves the state machine untouched.
    pub fn manual(label: &str, notes: Option<String>) -> DistractionRecord {
        DistractionRecord {
            kind: DistractionKind::Manual,
            duration: Duration::ZERO,
            notes: notes.unwrap_or_else(|| format!("Manually recorded distraction: {label}")),
        }
    }

    fn is_lapsed(&self, channel: Channel) -> bool {
        match channel {
            Channel::Pointer => self.pointer.lapsed,
            Channel::Keyboard => self.keyboard.lapsed,
            Channel::Visibility => self.hidden,
        }
    }

    fn lapse(&mut self, channel: Channel, now: Instant, transitions: &mut Vec<DistractionTransition>) {
        match self.state {
            AttentionState::Attentive => {
                self.state = AttentionState::Distracted {
                    reason: channel.reason(),
                    since: now,
                };
                transitions.push(DistractionTransition::Began {
                    reason: channel.reason(),
                });
            }
            AttentionState::Distracted { reason, .. } if reason == channel.reason() => {}
            AttentionState::Distracted { .. } => {
                if !self.pending.contains(&channel) {
                    self.pending.push(channel);
                }
            }
        }
    }

    /// Activity on `channel`. Ends the distraction it caused, or drops it from the queue.
    fn recover(&mut self, channel: Channel, now: Instant, transitions: &mut Vec<DistractionTransition>) {
        self.pending.retain(|v| *v != channel);
        let AttentionState::Distracted { reason, since } = self.state else {
            return;
        };
        if reason != channel.reason() {
            return;
        }

        transitions.push(DistractionTransition::Ended {
            reason,
            lasted: now - since,
        });
        self.state = AttentionState::Attentive;

        while !self.pending.is_empty() {
            let next = self.pending.remove(0);
            if self.is_lapsed(next) {
                self.lapse(next, now, transitions);
                break;
            }
        }
    }
}
