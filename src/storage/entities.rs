use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cause of a distraction event. Serialized with the labels used in the stored log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DistractionKind {
    Idle,
    AppSwitch,
    TypingInactivity,
    MouseInactivity,
    Manual,
}

impl DistractionKind {
    pub fn label(&self) -> &'static str {
        match self {
            DistractionKind::Idle => "idle",
            DistractionKind::AppSwitch => "app_switch",
            DistractionKind::TypingInactivity => "typing_inactivity",
            DistractionKind::MouseInactivity => "mouse_inactivity",
            DistractionKind::Manual => "manual",
        }
    }
}

impl Display for DistractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One attention lapse. A detected lapse is stored twice: once when it starts (duration 0) and
/// once when it ends, carrying how long it lasted.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DistractionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: DistractionKind,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DistractionEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: DistractionKind,
        duration: Duration,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kind,
            duration,
            notes,
        }
    }

    /// Events with zero duration mark the start of a lapse (or a manual note).
    pub fn is_onset(&self) -> bool {
        self.duration.is_zero()
    }
}

/// One continuous focus effort. `end_time` is `None` while the session is open.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(default)]
    pub distractions: Vec<DistractionEvent>,
}

impl Session {
    pub fn open(task_name: String, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_name,
            start_time,
            end_time: None,
            duration: Duration::zero(),
            distractions: vec![],
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Closes the session. Has no effect on a session that already ended, so the stored
    /// duration never changes once set.
    pub fn close(&mut self, end_time: DateTime<Utc>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.end_time = Some(end_time);
        self.duration = end_time - self.start_time;
        true
    }

    /// Time spent so far: the frozen duration for ended sessions, time since start otherwise.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match self.end_time {
            Some(_) => self.duration,
            None => now - self.start_time,
        }
    }
}

mod duration_ms {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_milliseconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = i64::deserialize(deserializer)?;
        Ok(Duration::milliseconds(ms))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{DistractionEvent, DistractionKind, Session};

    #[test]
    fn test_session_close_freezes_duration() {
        let start = Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap();
        let mut session = Session::open("Write report".into(), start);
        assert!(session.is_open());
        assert_eq!(session.duration, Duration::zero());

        assert!(session.close(start + Duration::minutes(10)));
        assert_eq!(session.duration, Duration::milliseconds(600_000));

        assert!(!session.close(start + Duration::minutes(30)));
        assert_eq!(session.end_time, Some(start + Duration::minutes(10)));
        assert_eq!(session.duration, Duration::milliseconds(600_000));
    }

    #[test]
    fn test_session_wire_format() -> anyhow::Result<()> {
        let start = Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap();
        let mut session = Session::open("Write report".into(), start);
        session.distractions.push(DistractionEvent::new(
            start + Duration::seconds(5),
            DistractionKind::MouseInactivity,
            Duration::milliseconds(1500),
            None,
        ));

        let value = serde_json::to_value(&session)?;
        assert_eq!(value["taskName"], "Write report");
        assert!(value["endTime"].is_null());
        assert_eq!(value["duration"], 0);
        assert_eq!(value["distractions"][0]["type"], "mouse_inactivity");
        assert_eq!(value["distractions"][0]["duration"], 1500);
        assert!(value["distractions"][0].get("notes").is_none());

        let parsed: Session = serde_json::from_value(value)?;
        assert_eq!(parsed, session);
        Ok(())
    }
}
