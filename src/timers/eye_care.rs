use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::{
    notify::Notification,
    settings::{EyeCareSettings, SoundKind},
    utils::percentage::Percentage,
};

use super::{TimerEngine, TimerSnapshot};

const BLINK_BREAK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reminder {
    EyeBreak,
    Blink,
    ScreenBreak,
}

impl Reminder {
    pub fn next(&self) -> Reminder {
        match self {
            Reminder::EyeBreak => Reminder::Blink,
            Reminder::Blink => Reminder::ScreenBreak,
            Reminder::ScreenBreak => Reminder::EyeBreak,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Reminder::EyeBreak => "Eye Break",
            Reminder::Blink => "Blink Reminder",
            Reminder::ScreenBreak => "Screen Break",
        }
    }

    fn prompt(&self) -> (&'static str, &'static str) {
        match self {
            Reminder::EyeBreak => (
                "Time for an eye break!",
                "Look at something 20 feet away for 20 seconds.",
            ),
            Reminder::Blink => (
                "Time to blink!",
                "Blink rapidly for a few seconds to refresh your eyes.",
            ),
            Reminder::ScreenBreak => (
                "Time for a screen break!",
                "Stand up, stretch, and look away from your screen.",
            ),
        }
    }

    fn interval(&self, settings: &EyeCareSettings) -> Duration {
        let minutes = match self {
            Reminder::EyeBreak => settings.eye_break_interval,
            Reminder::Blink => settings.blink_interval,
            Reminder::ScreenBreak => settings.screen_break_interval,
        };
        Duration::from_secs(minutes as u64 * 60)
    }

    fn break_duration(&self, settings: &EyeCareSettings) -> Duration {
        match self {
            Reminder::EyeBreak => Duration::from_secs(settings.eye_break_duration as u64),
            Reminder::Blink => BLINK_BREAK,
            Reminder::ScreenBreak => Duration::from_secs(settings.screen_break_duration as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeCarePhase {
    Work,
    Break,
}

/// Rotates through eye break, blink and screen break reminders. Each reminder is a work phase
/// followed by a short break, then the next reminder starts.
#[derive(Debug)]
pub struct EyeCareReminder {
    settings: EyeCareSettings,
    reminder: Reminder,
    phase: EyeCarePhase,
    remaining: Duration,
    phase_total: Duration,
    ends_at: Option<Instant>,
}

impl EyeCareReminder {
    pub fn new(settings: EyeCareSettings) -> Self {
        let total = Reminder::EyeBreak.interval(&settings);
        Self {
            settings,
            reminder: Reminder::EyeBreak,
            phase: EyeCarePhase::Work,
            remaining: total,
            phase_total: total,
            ends_at: None,
        }
    }

    pub fn reminder(&self) -> Reminder {
        self.reminder
    }

    pub fn phase(&self) -> EyeCarePhase {
        self.phase
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    fn notification(&self, title: &str, message: &str) -> Notification {
        let notification = Notification::new(title, message);
        if self.settings.play_sounds {
            notification.with_sound(SoundKind::EyeCare)
        } else {
            notification
        }
    }

    fn enter(&mut self, phase: EyeCarePhase, from: Option<Instant>) {
        self.phase = phase;
        self.phase_total = match phase {
            EyeCarePhase::Work => self.reminder.interval(&self.settings),
            EyeCarePhase::Break => self.reminder.break_duration(&self.settings),
        };
        self.remaining = self.phase_total;
        self.ends_at = from.map(|v| v + self.phase_total);
    }
}

impl TimerEngine for EyeCareReminder {
    type Settings = EyeCareSettings;

    fn is_active(&self) -> bool {
        self.ends_at.is_some()
    }

    fn set_active(&mut self, active: bool, now: Instant) {
        if active == self.is_active() {
            return;
        }
        if active {
            self.enter(EyeCarePhase::Work, Some(now));
            return;
        }
        match (self.phase, self.ends_at.take()) {
            (EyeCarePhase::Work, Some(ends_at)) => {
                self.remaining = ends_at.saturating_duration_since(now);
            }
            _ => self.enter(EyeCarePhase::Work, None),
        }
    }

    /// Restarts the work phase of the current reminder, keeping the timer running if it was.
    fn reset(&mut self, now: Instant) {
        let from = self.is_active().then_some(now);
        self.enter(EyeCarePhase::Work, from);
    }

    fn apply_settings(&mut self, settings: EyeCareSettings, _now: Instant) {
        self.settings = settings;
        if !self.is_active() {
            self.enter(self.phase, None);
        }
    }

    fn tick(&mut self, now: Instant) -> Vec<Notification> {
        let mut notifications = vec![];
        // Catch up phase by phase, a late tick may have skipped a whole break.
        while let Some(ends_at) = self.ends_at {
            self.remaining = ends_at.saturating_duration_since(now);
            if !self.remaining.is_zero() {
                break;
            }
            match self.phase {
                EyeCarePhase::Work => {
                    let (title, message) = self.reminder.prompt();
                    notifications.push(self.notification(title, message));
                    self.enter(EyeCarePhase::Break, Some(ends_at));
                }
                EyeCarePhase::Break => {
                    notifications.push(
                        self.notification("Break completed!", "Time to get back to work."),
                    );
                    self.reminder = self.reminder.next();
                    self.enter(EyeCarePhase::Work, Some(ends_at));
                    info!("Next eye care reminder: {:?}", self.reminder);
                }
            }
        }
        notifications
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            title: self.reminder.title(),
            on_break: self.phase == EyeCarePhase::Break,
            remaining: self.remaining,
            progress: Percentage::remaining(self.remaining, self.phase_total),
            active: self.is_active(),
        }
    }
}
