//! Countdown timers shown next to a focus session. Engines are plain state machines that keep
//! the absolute end of the running phase and recompute what is left on every tick, the
//! [driver::TimerDriver] decides when to tick them.

pub mod driver;
pub mod eye_care;
pub mod pomodoro;

use std::{fmt::Display, time::Duration};

use tokio::time::Instant;

use crate::{
    notify::Notification,
    utils::{percentage::Percentage, time::format_countdown},
};

pub trait TimerEngine {
    type Settings;

    fn is_active(&self) -> bool;

    /// Activating always starts the current phase from the beginning.
    fn set_active(&mut self, active: bool, now: Instant);

    fn toggle(&mut self, now: Instant) {
        let active = !self.is_active();
        self.set_active(active, now);
    }

    fn reset(&mut self, now: Instant);

    /// While inactive the displayed time follows the new settings right away. While active
    /// they only take effect from the next phase.
    fn apply_settings(&mut self, settings: Self::Settings, now: Instant);

    /// Brings the engine up to `now` and returns what the user should be told about it.
    fn tick(&mut self, now: Instant) -> Vec<Notification>;

    fn snapshot(&self) -> TimerSnapshot;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimerSnapshot {
    pub title: &'static str,
    pub on_break: bool,
    pub remaining: Duration,
    pub progress: Percentage,
    pub active: bool,
}

impl Display for TimerSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{} {} ({}) {}",
            self.title,
            if self.on_break { " (break)" } else { "" },
            format_countdown(self.remaining),
            self.progress,
            if self.active { "running" } else { "paused" }
        )
    }
}
