use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::{
    notify::Notification,
    settings::{SoundKind, TimerSettings},
    utils::percentage::Percentage,
};

use super::{TimerEngine, TimerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PomodoroMode {
    Focus,
    Break,
}

impl PomodoroMode {
    fn title(&self) -> &'static str {
        match self {
            PomodoroMode::Focus => "Focus Time",
            PomodoroMode::Break => "Break Time",
        }
    }
}

/// Focus/break cycle. When a phase runs out the timer switches mode and stops, the user starts
/// the next phase.
#[derive(Debug)]
pub struct PomodoroTimer {
    settings: TimerSettings,
    mode: PomodoroMode,
    remaining: Duration,
    phase_total: Duration,
    ends_at: Option<Instant>,
}

impl PomodoroTimer {
    pub fn new(settings: TimerSettings) -> Self {
        let total = settings.focus_duration();
        Self {
            settings,
            mode: PomodoroMode::Focus,
            remaining: total,
            phase_total: total,
            ends_at: None,
        }
    }

    pub fn mode(&self) -> PomodoroMode {
        self.mode
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    fn mode_duration(&self) -> Duration {
        match self.mode {
            PomodoroMode::Focus => self.settings.focus_duration(),
            PomodoroMode::Break => self.settings.break_duration(),
        }
    }

    fn restore(&mut self) {
        self.phase_total = self.mode_duration();
        self.remaining = self.phase_total;
    }
}

impl TimerEngine for PomodoroTimer {
    type Settings = TimerSettings;

    fn is_active(&self) -> bool {
        self.ends_at.is_some()
    }

    fn set_active(&mut self, active: bool, now: Instant) {
        if active == self.is_active() {
            return;
        }
        if active {
            self.restore();
            self.ends_at = Some(now + self.phase_total);
        } else if let Some(ends_at) = self.ends_at.take() {
            self.remaining = ends_at.saturating_duration_since(now);
        }
    }

    fn reset(&mut self, _now: Instant) {
        self.ends_at = None;
        self.restore();
    }

    fn apply_settings(&mut self, settings: TimerSettings, _now: Instant) {
        self.settings = settings;
        if !self.is_active() {
            self.restore();
        }
    }

    fn tick(&mut self, now: Instant) -> Vec<Notification> {
        let Some(ends_at) = self.ends_at else {
            return vec![];
        };
        self.remaining = ends_at.saturating_duration_since(now);
        if !self.remaining.is_zero() {
            return vec![];
        }

        let notification = match self.mode {
            PomodoroMode::Focus => Notification::new(
                "Great job! Time for a break",
                "Take a moment to rest your eyes and stretch.",
            )
            .with_sound(SoundKind::Break),
            PomodoroMode::Break => {
                Notification::new("Break time is over!", "Time to get back to work!")
                    .with_sound(SoundKind::Notification)
            }
        };
        self.mode = match self.mode {
            PomodoroMode::Focus => PomodoroMode::Break,
            PomodoroMode::Break => PomodoroMode::Focus,
        };
        self.ends_at = None;
        self.restore();
        info!("Pomodoro switched to {:?}", self.mode);
        vec![notification]
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            title: self.mode.title(),
            on_break: self.mode == PomodoroMode::Break,
            remaining: self.remaining,
            progress: Percentage::remaining(self.remaining, self.phase_total),
            active: self.is_active(),
        }
    }
}
