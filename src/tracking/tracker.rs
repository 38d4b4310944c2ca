use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::{
    storage::{
        entities::{DistractionEvent, DistractionKind, Session},
        session_log::SessionLogStore,
    },
    utils::clock::Clock,
};

use super::distraction::DistractionRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Task name must not be empty")]
    EmptyTaskName,
}

/// Owns the session log. Every operation re-reads the store so changes made by another process
/// are picked up (last writer wins). When the store can't be read or written the tracker keeps
/// working from its in-memory copy.
pub struct SessionTracker<S> {
    store: S,
    clock: Arc<dyn Clock>,
    sessions: Vec<Session>,
}

impl<S: SessionLogStore> SessionTracker<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            sessions: vec![],
        }
    }

    /// Opens a new session. A session left open is ended first, there is only ever one.
    #[instrument(skip(self))]
    pub async fn start_session(&mut self, task_name: &str) -> Result<Session, TrackerError> {
        let task_name = task_name.trim();
        if task_name.is_empty() {
            return Err(TrackerError::EmptyTaskName);
        }

        self.load().await;
        let now = self.clock.time();
        for session in self.sessions.iter_mut().filter(|v| v.is_open()) {
            info!("Ending session {} before starting a new one", session.id);
            session.close(now);
        }

        let session = Session::open(task_name.to_owned(), now);
        self.sessions.push(session.clone());
        self.persist().await;
        info!("Started session {} for {:?}", session.id, session.task_name);
        Ok(session)
    }

    /// Returns `None` when there is no such session or it has already ended.
    #[instrument(skip(self))]
    pub async fn end_session(&mut self, session_id: Uuid) -> Option<Session> {
        self.load().await;
        let now = self.clock.time();
        let Some(session) = self.sessions.iter_mut().find(|v| v.id == session_id) else {
            debug!("No session {session_id} to end");
            return None;
        };
        if !session.close(now) {
            debug!("Session {session_id} already ended");
            return None;
        }
        let session = session.clone();
        self.persist().await;
        info!("Ended session {} after {}ms", session.id, session.duration.num_milliseconds());
        Some(session)
    }

    #[instrument(skip(self))]
    pub async fn add_distraction_event(
        &mut self,
        session_id: Uuid,
        kind: DistractionKind,
        duration: Duration,
        notes: Option<String>,
    ) -> Option<DistractionEvent> {
        self.load().await;
        let now = self.clock.time();
        let Some(session) = self.sessions.iter_mut().find(|v| v.id == session_id) else {
            debug!("Dropping {kind} event, no session {session_id}");
            return None;
        };
        let event = DistractionEvent::new(now, kind, duration, notes);
        session.distractions.push(event.clone());
        self.persist().await;
        Some(event)
    }

    /// Appends a detector or manual record to a session.
    pub async fn record(
        &mut self,
        session_id: Uuid,
        record: DistractionRecord,
    ) -> Option<DistractionEvent> {
        let duration = Duration::milliseconds(record.duration.as_millis() as i64);
        self.add_distraction_event(session_id, record.kind, duration, Some(record.notes))
            .await
    }

    pub async fn current_session(&mut self) -> Option<Session> {
        self.load().await;
        self.sessions.iter().find(|v| v.is_open()).cloned()
    }

    /// Sessions that started within `start..=end`.
    pub async fn sessions_by_date_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Session> {
        self.load().await;
        self.sessions
            .iter()
            .filter(|v| v.start_time >= start && v.start_time <= end)
            .cloned()
            .collect()
    }

    pub async fn all_sessions(&mut self) -> Vec<Session> {
        self.load().await;
        self.sessions.clone()
    }

    async fn load(&mut self) {
        match self.store.get_all().await {
            Ok(sessions) => self.sessions = sessions,
            Err(e) => error!("Failed to read session log, using in-memory copy: {e:?}"),
        }
    }

    async fn persist(&mut self) {
        if let Err(e) = self.store.save_all(&self.sessions).await {
            error!("Failed to save session log, changes are kept in memory only: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration as StdDuration};

    use anyhow::{anyhow, Result};
    use chrono::Duration;
    use uuid::Uuid;

    use crate::{
        storage::{
            entities::{DistractionKind, Session},
            session_log::{MemorySessionLog, SessionLogStore},
        },
        utils::{clock::TestClock, logging::TEST_LOGGING},
    };

    use super::{SessionTracker, TrackerError};

    fn tracker() -> (Arc<MemorySessionLog>, SessionTracker<Arc<MemorySessionLog>>) {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionLog::new());
        let tracker = SessionTracker::new(store.clone(), Arc::new(TestClock::new()));
        (store, tracker)
    }

    struct UnavailableLog;

    impl SessionLogStore for UnavailableLog {
        async fn get_all(&self) -> Result<Vec<Session>> {
            Err(anyhow!("storage is gone"))
        }

        async fn save_all(&self, _sessions: &[Session]) -> Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_report_scenario() {
        let (store, mut tracker) = tracker();

        let session = tracker.start_session("Write report").await.unwrap();
        assert_eq!(session.task_name, "Write report");
        assert_eq!(session.end_time, None);
        assert!(session.distractions.is_empty());
        assert_eq!(store.get_all().await.unwrap(), vec![session.clone()]);

        tokio::time::advance(StdDuration::from_secs(600)).await;

        let ended = tracker.end_session(session.id).await.unwrap();
        assert_eq!(ended.duration, Duration::milliseconds(600_000));
        assert_eq!(ended.end_time, Some(ended.start_time + ended.duration));
        assert_eq!(tracker.current_session().await, None);
    }

    #[tokio::test]
    async fn test_empty_task_name_is_rejected_without_mutation() {
        let (store, mut tracker) = tracker();
        assert_eq!(
            tracker.start_session("   ").await,
            Err(TrackerError::EmptyTaskName)
        );
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_open_session() {
        let (_, mut tracker) = tracker();
        let mut ids = vec![];
        for step in 0..12 {
            tokio::time::advance(StdDuration::from_secs(30)).await;
            if step % 3 == 2 {
                let id = ids[step % ids.len()];
                tracker.end_session(id).await;
            } else {
                ids.push(tracker.start_session(&format!("task {step}")).await.unwrap().id);
            }
            let open = tracker
                .all_sessions()
                .await
                .iter()
                .filter(|v| v.is_open())
                .count();
            assert!(open <= 1, "{open} sessions open after step {step}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_session_is_idempotent() {
        let (store, mut tracker) = tracker();
        let session = tracker.start_session("Inbox zero").await.unwrap();
        tokio::time::advance(StdDuration::from_secs(60)).await;
        let ended = tracker.end_session(session.id).await.unwrap();

        tokio::time::advance(StdDuration::from_secs(60)).await;
        let before = store.get_all().await.unwrap();
        assert_eq!(tracker.end_session(session.id).await, None);
        assert_eq!(tracker.end_session(Uuid::new_v4()).await, None);
        assert_eq!(store.get_all().await.unwrap(), before);
        assert_eq!(before[0].duration, ended.duration);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distraction_events_are_ordered() {
        let (_, mut tracker) = tracker();
        let session = tracker.start_session("Deep work").await.unwrap();

        assert_eq!(
            tracker
                .add_distraction_event(Uuid::new_v4(), DistractionKind::Manual, Duration::zero(), None)
                .await,
            None
        );

        let first = tracker
            .add_distraction_event(session.id, DistractionKind::Idle, Duration::zero(), None)
            .await
            .unwrap();
        tokio::time::advance(StdDuration::from_secs(5)).await;
        let second = tracker
            .add_distraction_event(
                session.id,
                DistractionKind::Idle,
                Duration::seconds(5),
                Some("back".into()),
            )
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let current = tracker.current_session().await.unwrap();
        assert_eq!(current.distractions, vec![first, second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_by_date_range_is_inclusive() {
        let (_, mut tracker) = tracker();
        let first = tracker.start_session("one").await.unwrap();
        tokio::time::advance(StdDuration::from_secs(3600)).await;
        let second = tracker.start_session("two").await.unwrap();
        tokio::time::advance(StdDuration::from_secs(3600)).await;
        tracker.start_session("three").await.unwrap();

        let found = tracker
            .sessions_by_date_range(first.start_time, second.start_time)
            .await;
        assert_eq!(
            found.iter().map(|v| v.task_name.as_str()).collect::<Vec<_>>(),
            vec!["one", "two"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_keep_in_memory_state() {
        *TEST_LOGGING;
        let mut tracker = SessionTracker::new(UnavailableLog, Arc::new(TestClock::new()));
        let session = tracker.start_session("Offline").await.unwrap();
        assert_eq!(tracker.current_session().await.unwrap().id, session.id);

        tokio::time::advance(StdDuration::from_secs(90)).await;
        let ended = tracker.end_session(session.id).await.unwrap();
        assert_eq!(ended.duration, Duration::seconds(90));
    }
}
