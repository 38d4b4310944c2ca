//! Focus session tracking for the terminal. Sessions are logged with every distraction that was
//! detected during them (inactivity, switching away, going idle) or reported by hand, next to a
//! pomodoro timer and eye-care reminders.

pub mod cli;
pub mod notify;
pub mod settings;
pub mod storage;
pub mod timers;
pub mod tracking;
pub mod utils;
