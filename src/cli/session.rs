use std::{fmt::Display, sync::Arc};

use anyhow::Result;
use ansi_term::Colour;
use chrono::{DateTime, Local, TimeDelta, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Subcommand, ValueEnum};
use now::DateTimeNow;

use crate::{
    storage::{entities::Session, session_log::SessionLogStore},
    tracking::{
        analysis::{history, summarize, HistoryRow},
        distraction::DistractionDetector,
        tracker::SessionTracker,
    },
    utils::{
        clock::{Clock, DefaultClock},
        time::{format_duration, next_day_start},
    },
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct RangeArgs {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"today\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take inputs as whole days. Without a start this selects today"
    )]
    treat_as_days: bool,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    #[command(about = "Start a focus session. A session that is still open is ended first")]
    Start {
        #[arg(required = true, num_args = 1.., help = "What you are working on")]
        task: Vec<String>,
    },
    #[command(about = "End the open session")]
    End,
    #[command(about = "Show the open session")]
    Current,
    #[command(about = "Record a distraction on the open session")]
    Distract {
        #[arg(help = "What distracted you, for example \"phone\"")]
        label: String,
        #[arg(long, short, help = "Free text note stored with the event")]
        note: Option<String>,
    },
    #[command(about = "List sessions, newest first")]
    List {
        #[command(flatten)]
        range: RangeArgs,
    },
    #[command(about = "Summarize focus time and distractions")]
    Summary {
        #[command(flatten)]
        range: RangeArgs,
    },
}

pub async fn process_session_command(
    command: SessionCommand,
    store: impl SessionLogStore,
) -> Result<()> {
    let clock = Arc::new(DefaultClock);
    let mut tracker = SessionTracker::new(store, clock.clone());

    match command {
        SessionCommand::Start { task } => {
            let session = tracker.start_session(&task.join(" ")).await?;
            println!(
                "Started {:?} at {}",
                session.task_name,
                session.start_time.with_timezone(&Local).format("%H:%M")
            );
        }
        SessionCommand::End => {
            let ended = match tracker.current_session().await {
                Some(session) => tracker.end_session(session.id).await,
                None => None,
            };
            match ended {
                Some(session) => println!(
                    "Ended {:?} after {}, {}",
                    session.task_name,
                    format_duration(session.duration),
                    distraction_count(&session)
                ),
                None => println!("No open session"),
            }
        }
        SessionCommand::Current => match tracker.current_session().await {
            Some(session) => println!(
                "{:?} running for {}, {}",
                session.task_name,
                format_duration(session.elapsed(clock.time())),
                distraction_count(&session)
            ),
            None => println!("No open session"),
        },
        SessionCommand::Distract { label, note } => {
            let event = match tracker.current_session().await {
                Some(session) => {
                    tracker
                        .record(session.id, DistractionDetector::manual(&label, note))
                        .await
                }
                None => None,
            };
            match event {
                Some(event) => println!(
                    "Recorded: {}",
                    event.notes.as_deref().unwrap_or(event.kind.label())
                ),
                None => println!("No open session to record a distraction on"),
            }
        }
        SessionCommand::List { range } => {
            let sessions = select_sessions(&mut tracker, range, clock.as_ref()).await?;
            if sessions.is_empty() {
                println!("No sessions yet");
            }
            for row in history(&sessions) {
                println!("{}", history_line(&row));
            }
        }
        SessionCommand::Summary { range } => {
            let sessions = select_sessions(&mut tracker, range, clock.as_ref()).await?;
            let summary = summarize(&sessions, clock.time());
            println!("Sessions\t{}", summary.sessions);
            println!("Focused\t\t{}", format_duration(summary.focused));
            println!("Distractions\t{}", summary.lapses);
            println!("Distracted\t{}", format_duration(summary.distracted));
            if let Some(percentage) = summary.focus_percentage() {
                println!("Focus\t\t{percentage}");
            }
        }
    }
    Ok(())
}

fn distraction_count(session: &Session) -> String {
    match session.distractions.len() {
        1 => "1 distraction".into(),
        n => format!("{n} distractions"),
    }
}

fn history_line(row: &HistoryRow) -> String {
    let distractions = if row.distractions == 0 {
        Colour::Green.paint(row.distraction_label())
    } else {
        Colour::Yellow.paint(row.distraction_label())
    };
    format!(
        "{}\t{}\t{}\t{}",
        row.start_time.with_timezone(&Local).format("%x %H:%M"),
        row.duration_label(),
        distractions,
        row.task_name
    )
}

async fn select_sessions<S: SessionLogStore>(
    tracker: &mut SessionTracker<S>,
    range: RangeArgs,
    clock: &dyn Clock,
) -> Result<Vec<Session>> {
    let now = clock.time().with_timezone(&Local);
    Ok(match parse_range(range, now)? {
        Some((start, end)) => {
            tracker
                .sessions_by_date_range(start.with_timezone(&Utc), end.with_timezone(&Utc))
                .await
        }
        None => tracker.all_sessions().await,
    })
}

/// `None` when no range was asked for, meaning every session.
fn parse_range(
    RangeArgs {
        start_date,
        end_date,
        date_style,
        treat_as_days,
    }: RangeArgs,
    now: DateTime<Local>,
) -> Result<Option<(DateTime<Local>, DateTime<Local>)>> {
    if start_date.is_none() && end_date.is_none() && !treat_as_days {
        return Ok(None);
    }

    let dialect: chrono_english::Dialect = date_style.into();
    let mut start = match start_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
        None if treat_as_days => now,
        None => DateTime::<Utc>::UNIX_EPOCH.with_timezone(&Local),
    };
    let mut end = match end_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate end date {e}"),
                )
                .into());
        }
        None => now,
    };
    if treat_as_days {
        // The range is inclusive, stop just short of the next midnight.
        start = start.beginning_of_day();
        end = next_day_start(end) - TimeDelta::nanoseconds(1);
    }
    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{Duration, Local, TimeZone};

    use crate::storage::{
        entities::DistractionKind,
        session_log::{MemorySessionLog, SessionLogStore},
    };

    use super::{parse_range, process_session_command, DateStyle, RangeArgs, SessionCommand};

    fn range(start: Option<&str>, end: Option<&str>, treat_as_days: bool) -> RangeArgs {
        RangeArgs {
            start_date: start.map(Into::into),
            end_date: end.map(Into::into),
            date_style: DateStyle::Uk,
            treat_as_days,
        }
    }

    #[test]
    fn test_parse_range() -> Result<()> {
        let now = Local.with_ymd_and_hms(2025, 3, 20, 15, 30, 0).unwrap();

        assert!(parse_range(range(None, None, false), now)?.is_none());

        let (start, end) = parse_range(range(Some("15/03/2025"), Some("15/03/2025"), true), now)?
            .unwrap();
        assert_eq!(start, Local.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(end - start, Duration::days(1) - Duration::nanoseconds(1));

        let (start, end) = parse_range(range(None, None, true), now)?.unwrap();
        assert_eq!(start, Local.with_ymd_and_hms(2025, 3, 20, 0, 0, 0).unwrap());
        let midnight = Local.with_ymd_and_hms(2025, 3, 21, 0, 0, 0).unwrap();
        assert!(end < midnight);
        assert_eq!(midnight - end, Duration::nanoseconds(1));

        assert!(parse_range(range(Some("not a date at all"), None, false), now).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_commands() -> Result<()> {
        let store = Arc::new(MemorySessionLog::new());

        let start = SessionCommand::Start {
            task: vec!["Write".into(), "report".into()],
        };
        process_session_command(start, store.clone()).await?;
        let distract = SessionCommand::Distract {
            label: "phone".into(),
            note: None,
        };
        process_session_command(distract, store.clone()).await?;
        process_session_command(SessionCommand::End, store.clone()).await?;
        // Nothing open any more, both are no-ops.
        process_session_command(SessionCommand::End, store.clone()).await?;
        let distract = SessionCommand::Distract {
            label: "email".into(),
            note: None,
        };
        process_session_command(distract, store.clone()).await?;

        let sessions = store.get_all().await?;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].task_name, "Write report");
        assert!(!sessions[0].is_open());
        assert_eq!(sessions[0].distractions.len(), 1);
        assert_eq!(sessions[0].distractions[0].kind, DistractionKind::Manual);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_task_rejected() -> Result<()> {
        let store = Arc::new(MemorySessionLog::new());
        let start = SessionCommand::Start {
            task: vec!["  ".into()],
        };
        assert!(process_session_command(start, store.clone()).await.is_err());
        assert!(store.get_all().await?.is_empty());
        Ok(())
    }
}
