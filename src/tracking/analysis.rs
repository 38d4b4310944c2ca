use chrono::{DateTime, Duration, Utc};

use crate::{
    storage::entities::{DistractionKind, Session},
    utils::{
        percentage::{duration_percentage, Percentage},
        time::format_duration,
    },
};

#[derive(Debug, PartialEq, Eq)]
pub struct HistoryRow {
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the session is still running.
    pub duration: Option<Duration>,
    pub distractions: usize,
}

impl HistoryRow {
    pub fn duration_label(&self) -> String {
        match self.duration {
            Some(duration) => format_duration(duration),
            None => "In progress".into(),
        }
    }

    pub fn distraction_label(&self) -> String {
        match self.distractions {
            0 => "Perfect Focus".into(),
            1 => "1 distraction".into(),
            n => format!("{n} distractions"),
        }
    }
}

/// Returns rows for the session history, newest session first.
pub fn history(sessions: &[Session]) -> Vec<HistoryRow> {
    let mut rows = sessions
        .iter()
        .map(|v| HistoryRow {
            task_name: v.task_name.clone(),
            start_time: v.start_time,
            duration: v.end_time.map(|_| v.duration),
            distractions: v.distractions.len(),
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    rows
}

#[derive(Debug, PartialEq, Eq)]
pub struct FocusSummary {
    pub sessions: usize,
    pub focused: Duration,
    pub lapses: usize,
    pub distracted: Duration,
}

impl FocusSummary {
    /// Share of focused time not lost to distractions. `None` when nothing was tracked.
    pub fn focus_percentage(&self) -> Option<Percentage> {
        let attentive = (self.focused - self.distracted).max(Duration::zero());
        duration_percentage(attentive, self.focused)
    }
}

/// Totals over `sessions`. Open sessions count up to `now`.
pub fn summarize(sessions: &[Session], now: DateTime<Utc>) -> FocusSummary {
    let mut summary = FocusSummary {
        sessions: sessions.len(),
        focused: Duration::zero(),
        lapses: 0,
        distracted: Duration::zero(),
    };

    for session in sessions {
        summary.focused += session.elapsed(now);
        for event in &session.distractions {
            if event.is_onset() || event.kind == DistractionKind::Manual {
                summary.lapses += 1;
            } else {
                summary.distracted += event.duration;
            }
        }
    }
    summary
}
