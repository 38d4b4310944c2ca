use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use futures::future::OptionFuture;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc, oneshot},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    notify::{Notification, Notifier},
    settings::SoundKind,
    storage::{
        entities::{DistractionEvent, DistractionKind, Session},
        session_log::SessionLogStore,
    },
    utils::clock::Clock,
};

use super::{
    activity::{ActivitySignal, ActivitySource},
    distraction::{DetectorConfig, DistractionDetector, DistractionRecord, DistractionTransition},
    idle::{IdleDetector, IdleTransition, DEFAULT_IDLE_THRESHOLD},
    tracker::{SessionTracker, TrackerError},
};

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub detector: DetectorConfig,
    pub idle_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

pub enum MonitorCommand {
    StartSession {
        task_name: String,
        reply: oneshot::Sender<Result<Session, TrackerError>>,
    },
    EndSession {
        reply: oneshot::Sender<Option<Session>>,
    },
    ManualDistraction {
        label: String,
        notes: Option<String>,
        reply: oneshot::Sender<Option<DistractionEvent>>,
    },
    Status {
        reply: oneshot::Sender<MonitorStatus>,
    },
}

#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub session: Option<Session>,
    pub distraction: Option<DistractionKind>,
    pub idle: bool,
}

/// Sending side of the monitor's command channel.
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    pub async fn start_session(&self, task_name: &str) -> Result<Result<Session, TrackerError>> {
        self.request(|reply| MonitorCommand::StartSession {
            task_name: task_name.to_owned(),
            reply,
        })
        .await
    }

    pub async fn end_session(&self) -> Result<Option<Session>> {
        self.request(|reply| MonitorCommand::EndSession { reply })
            .await
    }

    pub async fn distracted(
        &self,
        label: &str,
        notes: Option<String>,
    ) -> Result<Option<DistractionEvent>> {
        self.request(|reply| MonitorCommand::ManualDistraction {
            label: label.to_owned(),
            notes,
            reply,
        })
        .await
    }

    pub async fn status(&self) -> Result<MonitorStatus> {
        self.request(|reply| MonitorCommand::Status { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> MonitorCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| anyhow!("Focus monitor is not running"))?;
        response
            .await
            .map_err(|_| anyhow!("Focus monitor stopped before replying"))
    }
}

pub fn monitor_channel(capacity: usize) -> (MonitorHandle, mpsc::Receiver<MonitorCommand>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (MonitorHandle { sender }, receiver)
}

/// Event loop tying the detectors to the session log. It handles one input at a time (a
/// command, an activity signal or a watchdog deadline) and finishes every append it causes
/// before looking at the next one.
pub struct FocusMonitor<S, N> {
    tracker: SessionTracker<S>,
    distraction: DistractionDetector,
    idle: IdleDetector,
    activity: tokio::sync::broadcast::Receiver<ActivitySignal>,
    commands: mpsc::Receiver<MonitorCommand>,
    shutdown: CancellationToken,
    clock: Arc<dyn Clock>,
    notifier: N,
    active: Option<Uuid>,
}

impl<S: SessionLogStore, N: Notifier> FocusMonitor<S, N> {
    pub fn new(
        tracker: SessionTracker<S>,
        config: MonitorConfig,
        activity: &impl ActivitySource,
        commands: mpsc::Receiver<MonitorCommand>,
        shutdown: CancellationToken,
        clock: Arc<dyn Clock>,
        notifier: N,
    ) -> Self {
        let now = clock.instant();
        Self {
            tracker,
            distraction: DistractionDetector::new(config.detector),
            idle: IdleDetector::new(config.idle_threshold, now),
            activity: activity.subscribe(),
            commands,
            shutdown,
            clock,
            notifier,
            active: None,
        }
    }

    /// Executes the monitor event loop until shutdown or until every command sender is gone.
    pub async fn run(mut self) -> Result<()> {
        if let Some(session) = self.tracker.current_session().await {
            info!("Resuming session {} for {:?}", session.id, session.task_name);
            self.activate(session.id).await;
        }

        let mut listening = true;
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("Command channel closed");
                        break;
                    }
                },
                signal = self.activity.recv(), if listening => match signal {
                    Ok(signal) => self.handle_signal(signal).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Monitor fell behind, skipped {skipped} activity signals")
                    }
                    Err(RecvError::Closed) => {
                        debug!("Activity source closed");
                        listening = false;
                    }
                },
                Some(()) = OptionFuture::from(deadline.map(|v| self.clock.sleep_until(v))) => {
                    self.handle_deadline().await
                }
            }
        }

        // The session stays open for the next run, but an active distraction can't outlive us.
        let now = self.clock.instant();
        let transitions = self.distraction.set_enabled(false, now);
        self.apply(transitions).await;
        self.notifier.set_background_sound(false);
        info!("Focus monitor stopped");
        Ok(())
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.distraction.next_deadline(), self.idle.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn handle_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::StartSession { task_name, reply } => {
                let result = self.start_session(&task_name).await;
                let _ = reply.send(result);
            }
            MonitorCommand::EndSession { reply } => {
                let result = self.end_session().await;
                let _ = reply.send(result);
            }
            MonitorCommand::ManualDistraction {
                label,
                notes,
                reply,
            } => {
                let event = match self.active {
                    Some(id) => {
                        self.tracker
                            .record(id, DistractionDetector::manual(&label, notes))
                            .await
                    }
                    None => None,
                };
                let _ = reply.send(event);
            }
            MonitorCommand::Status { reply } => {
                let status = MonitorStatus {
                    session: self.tracker.current_session().await,
                    distraction: self.distraction.reason(),
                    idle: self.idle.is_idle(),
                };
                let _ = reply.send(status);
            }
        }
    }

    async fn start_session(&mut self, task_name: &str) -> Result<Session, TrackerError> {
        if task_name.trim().is_empty() {
            return Err(TrackerError::EmptyTaskName);
        }
        self.deactivate().await;
        let session = self.tracker.start_session(task_name).await?;
        self.activate(session.id).await;
        self.notifier.notify(&Notification::new(
            "Focus session started",
            format!("Working on: {}", session.task_name),
        ));
        Ok(session)
    }

    async fn end_session(&mut self) -> Option<Session> {
        let id = match self.active {
            Some(id) => id,
            None => self.tracker.current_session().await?.id,
        };
        self.deactivate().await;
        let session = self.tracker.end_session(id).await?;
        self.notifier.notify(&Notification::new(
            "Focus session completed",
            format!(
                "You focused for {} minutes on {}",
                session.duration.num_minutes(),
                session.task_name
            ),
        ));
        Some(session)
    }

    async fn activate(&mut self, session_id: Uuid) {
        self.active = Some(session_id);
        let now = self.clock.instant();
        let transitions = self.distraction.set_enabled(true, now);
        self.apply(transitions).await;
        self.notifier.set_background_sound(true);
    }

    /// Closes an active distraction against the current session before letting it go.
    async fn deactivate(&mut self) {
        let now = self.clock.instant();
        let transitions = self.distraction.set_enabled(false, now);
        self.apply(transitions).await;
        self.active = None;
        self.notifier.set_background_sound(false);
    }

    async fn handle_signal(&mut self, signal: ActivitySignal) {
        let now = self.clock.instant();
        let transitions = self.distraction.observe(signal, now);
        self.apply(transitions).await;
        if let Some(transition) = self.idle.observe(signal, now) {
            self.apply_idle(transition).await;
        }
    }

    async fn handle_deadline(&mut self) {
        let now = self.clock.instant();
        let transitions = self.distraction.poll(now);
        self.apply(transitions).await;
        if let Some(transition) = self.idle.poll(now) {
            self.apply_idle(transition).await;
        }
    }

    async fn apply(&mut self, transitions: Vec<DistractionTransition>) {
        for transition in transitions {
            info!("Attention changed: {transition:?}");
            let record = transition.record();
            if let DistractionTransition::Began { .. } = transition {
                self.notifier.notify(
                    &Notification::new("Distraction detected", record.notes.clone())
                        .with_sound(SoundKind::Distraction),
                );
            }
            self.record(record).await;
        }
    }

    async fn apply_idle(&mut self, transition: IdleTransition) {
        info!("Idle changed: {transition:?}");
        if transition == IdleTransition::Entered && self.active.is_some() {
            self.notifier.notify(&Notification::new(
                "Auto-paused",
                "You seem to be away from the screen",
            ));
        }
        self.record(transition.record()).await;
    }

    async fn record(&mut self, record: DistractionRecord) {
        match self.active {
            Some(id) => {
                self.tracker.record(id, record).await;
            }
            None => debug!("No open session, not recording {:?}", record.kind),
        }
    }
}
