use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use super::entities::Session;

/// Whole-collection persistence of the session log. There is no partial update:
/// callers read everything, modify, and write everything back.
pub trait SessionLogStore {
    /// Returns sessions in insertion order. Missing or unreadable entries are not an error.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Session>>>;

    fn save_all(&self, sessions: &[Session]) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> SessionLogStore for T
where
    T::Target: SessionLogStore,
{
    fn get_all(&self) -> impl Future<Output = Result<Vec<Session>>> {
        self.deref().get_all()
    }

    fn save_all(&self, sessions: &[Session]) -> impl Future<Output = Result<()>> {
        self.deref().save_all(sessions)
    }
}

/// Stores the log as JSON lines, one session per line. File locks keep a one-shot CLI command
/// and a running dashboard from reading half-written data.
pub struct FileSessionLog {
    path: PathBuf,
}

impl FileSessionLog {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionLogStore for FileSessionLog {
    async fn get_all(&self) -> Result<Vec<Session>> {
        async fn extract(path: &Path) -> std::result::Result<Vec<Session>, std::io::Error> {
            debug!("Reading session log {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let mut buffer = BufReader::new(file);
            let mut sessions = vec![];
            // Raw bytes, so a line that isn't UTF-8 is skipped like any other bad entry.
            let mut line = Vec::new();
            let read = async {
                loop {
                    line.clear();
                    if buffer.read_until(b'\n', &mut line).await? == 0 {
                        break;
                    }
                    if line.trim_ascii().is_empty() {
                        continue;
                    }
                    match serde_json::from_slice::<Session>(&line) {
                        Ok(v) => sessions.push(v),
                        Err(e) => warn!(
                            "Skipping corrupted session in {:?} {}: {e}",
                            path,
                            String::from_utf8_lossy(&line)
                        ),
                    }
                }
                Ok::<_, std::io::Error>(())
            }
            .await;

            buffer.into_inner().unlock_async().await?;
            read?;

            Ok(sessions)
        }

        match extract(&self.path).await {
            Ok(sessions) => Ok(sessions),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e)?,
        }
    }

    async fn save_all(&self, sessions: &[Session]) -> Result<()> {
        let mut buffer = Vec::<u8>::new();
        for session in sessions {
            serde_json::to_writer(&mut buffer, session)?;
            buffer.push(b'\n');
        }

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        file.lock_exclusive()?;
        let result = async {
            file.set_len(0).await?;
            file.rewind().await?;
            file.write_all(&buffer).await?;
            file.flush().await?;
            file.sync_data().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        file.unlock_async().await?;
        result?;
        debug!("Saved {} sessions to {:?}", sessions.len(), self.path);
        Ok(())
    }
}

/// Keeps the log in memory only. Useful for embedding and tests.
#[derive(Default)]
pub struct MemorySessionLog {
    sessions: Mutex<Vec<Session>>,
}

impl MemorySessionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionLogStore for MemorySessionLog {
    async fn get_all(&self) -> Result<Vec<Session>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow!("Session log lock was poisoned"))?;
        Ok(sessions.clone())
    }

    async fn save_all(&self, sessions: &[Session]) -> Result<()> {
        let mut stored = self
            .sessions
            .lock()
            .map_err(|_| anyhow!("Session log lock was poisoned"))?;
        *stored = sessions.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc};

    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        storage::entities::{DistractionEvent, DistractionKind, Session},
        tracking::tracker::SessionTracker,
        utils::{clock::TestClock, logging::TEST_LOGGING},
    };

    use super::{FileSessionLog, SessionLogStore};

    fn test_sessions() -> Vec<Session> {
        let start = Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap();
        let mut first = Session::open("Write report".into(), start);
        first.distractions.push(DistractionEvent::new(
            start + Duration::minutes(1),
            DistractionKind::AppSwitch,
            Duration::zero(),
            Some("Switched to another app or tab".into()),
        ));
        first.close(start + Duration::minutes(30));
        let second = Session::open("Review".into(), start + Duration::hours(1));
        vec![first, second]
    }

    #[tokio::test]
    async fn test_file_log_missing_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let log = FileSessionLog::new(dir.path().join("nested").join("sessions.jsonl"))?;
        assert!(log.get_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_log_save_replaces_content() -> Result<()> {
        let dir = tempdir()?;
        let log = FileSessionLog::new(dir.path().join("sessions.jsonl"))?;
        let sessions = test_sessions();

        log.save_all(&sessions).await?;
        assert_eq!(log.get_all().await?, sessions);

        log.save_all(&sessions[..1]).await?;
        assert_eq!(log.get_all().await?, sessions[..1].to_vec());

        let content = std::fs::read_to_string(log.path())?;
        assert_eq!(content.lines().count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_log_skips_corrupted_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sessions.jsonl");
        let sessions = test_sessions();

        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "{}", serde_json::to_string(&sessions[0])?)?;
        writeln!(file, "{{\"id\": \"not a session\"")?;
        writeln!(file, "{}", serde_json::to_string(&sessions[1])?)?;
        write!(file, "{{\"taskName\":\"cut of")?;
        drop(file);

        let log = FileSessionLog::new(path)?;
        assert_eq!(log.get_all().await?, sessions);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_log_survives_non_utf8_line() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("sessions.jsonl");
        let sessions = test_sessions();

        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "{}", serde_json::to_string(&sessions[0])?)?;
        file.write_all(b"\xff\xfe garbage\n")?;
        writeln!(file, "{}", serde_json::to_string(&sessions[1])?)?;
        drop(file);

        let log = Arc::new(FileSessionLog::new(path)?);
        assert_eq!(log.get_all().await?, sessions);

        // The tracker rewrites the whole log, nothing after the bad line may go missing.
        let mut tracker = SessionTracker::new(log.clone(), Arc::new(TestClock::new()));
        tracker.start_session("New").await?;
        let tasks = log
            .get_all()
            .await?
            .into_iter()
            .map(|v| v.task_name)
            .collect::<Vec<_>>();
        assert_eq!(tasks, vec!["Write report", "Review", "New"]);
        Ok(())
    }
}
