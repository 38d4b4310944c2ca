use std::{fmt::Display, ops::Deref};

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%", self.0)
    }
}

impl Percentage {
    pub const FULL: Percentage = Percentage(100.);

    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || value.is_nan() {
            None
        } else {
            Some(Percentage(value))
        }
    }

    /// Share of `total` that is still left. Used for timer progress bars, so the result is kept
    /// inside 0..=100 even if a tick lands slightly past the end of a phase.
    pub fn remaining(remaining: std::time::Duration, total: std::time::Duration) -> Percentage {
        if total.is_zero() {
            return Percentage(0.);
        }
        let value = remaining.as_secs_f64() / total.as_secs_f64() * 100.;
        Percentage(value.clamp(0., 100.))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Returns `None` for an empty `whole`, there is nothing to take a share of.
pub fn duration_percentage(value: Duration, whole: Duration) -> Option<Percentage> {
    if whole.is_zero() {
        return None;
    }
    Percentage::new_opt(value.num_milliseconds() as f64 / whole.num_milliseconds() as f64 * 100.)
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::{duration_percentage, Percentage};

    #[test]
    fn test_remaining_is_clamped() {
        let total = StdDuration::from_secs(60);
        assert_eq!(*Percentage::remaining(StdDuration::from_secs(30), total), 50.);
        assert_eq!(*Percentage::remaining(StdDuration::from_secs(90), total), 100.);
        assert_eq!(*Percentage::remaining(StdDuration::ZERO, StdDuration::ZERO), 0.);
    }

    #[test]
    fn test_duration_percentage() {
        let value = duration_percentage(Duration::minutes(15), Duration::hours(1)).unwrap();
        assert_eq!(*value, 25.);
        assert_eq!(value.to_string(), "25%");
        assert!(duration_percentage(Duration::minutes(1), Duration::zero()).is_none());
    }
}
