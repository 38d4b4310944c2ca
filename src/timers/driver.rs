use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use futures::future::OptionFuture;
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{notify::Notifier, utils::clock::Clock};

use super::{TimerEngine, TimerSnapshot};

const TICK: Duration = Duration::from_secs(1);

pub enum TimerCommand<S> {
    Toggle,
    Reset,
    Configure(S),
    Snapshot(oneshot::Sender<TimerSnapshot>),
}

pub struct TimerHandle<S> {
    sender: mpsc::Sender<TimerCommand<S>>,
}

impl<S> Clone for TimerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S> TimerHandle<S> {
    pub async fn toggle(&self) -> Result<()> {
        self.send(TimerCommand::Toggle).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(TimerCommand::Reset).await
    }

    pub async fn configure(&self, settings: S) -> Result<()> {
        self.send(TimerCommand::Configure(settings)).await
    }

    pub async fn snapshot(&self) -> Result<TimerSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(TimerCommand::Snapshot(reply)).await?;
        response
            .await
            .map_err(|_| anyhow!("Timer stopped before replying"))
    }

    async fn send(&self, command: TimerCommand<S>) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| anyhow!("Timer is not running"))
    }
}

pub fn timer_channel<S>(capacity: usize) -> (TimerHandle<S>, mpsc::Receiver<TimerCommand<S>>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (TimerHandle { sender }, receiver)
}

/// Ticks an engine once per second while it is active. No tick is scheduled while it is
/// paused.
pub struct TimerDriver<E: TimerEngine, N> {
    name: &'static str,
    engine: E,
    commands: mpsc::Receiver<TimerCommand<E::Settings>>,
    shutdown: CancellationToken,
    clock: Arc<dyn Clock>,
    notifier: N,
}

impl<E: TimerEngine, N: Notifier> TimerDriver<E, N> {
    pub fn new(
        name: &'static str,
        engine: E,
        commands: mpsc::Receiver<TimerCommand<E::Settings>>,
        shutdown: CancellationToken,
        clock: Arc<dyn Clock>,
        notifier: N,
    ) -> Self {
        Self {
            name,
            engine,
            commands,
            shutdown,
            clock,
            notifier,
        }
    }

    /// Executes the timer event loop.
    pub async fn run(mut self) -> Result<()> {
        let mut next_tick: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("{} command channel closed", self.name);
                        break;
                    };
                    let was_active = self.engine.is_active();
                    self.handle_command(command);
                    if self.engine.is_active() != was_active {
                        info!("{} {}", self.name, if was_active { "paused" } else { "started" });
                        next_tick = None;
                    }
                }
                Some(()) = OptionFuture::from(next_tick.map(|v| self.clock.sleep_until(v))) => {
                    let now = self.clock.instant();
                    for notification in self.engine.tick(now) {
                        self.notifier.notify(&notification);
                    }
                    next_tick = next_tick.map(|v| v + TICK);
                }
            }

            if !self.engine.is_active() {
                next_tick = None;
            } else if next_tick.is_none() {
                next_tick = Some(self.clock.instant() + TICK);
            }
        }
        info!("{} stopped", self.name);
        Ok(())
    }

    fn handle_command(&mut self, command: TimerCommand<E::Settings>) {
        let now = self.clock.instant();
        match command {
            TimerCommand::Toggle => self.engine.toggle(now),
            TimerCommand::Reset => self.engine.reset(now),
            TimerCommand::Configure(settings) => self.engine.apply_settings(settings, now),
            TimerCommand::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use tokio_util::sync::CancellationToken;

    use crate::{
        notify::MockNotifier,
        settings::{SoundKind, TimerSettings},
        timers::pomodoro::PomodoroTimer,
        utils::{clock::TestClock, logging::TEST_LOGGING},
    };

    use super::{timer_channel, TimerDriver};

    fn short_pomodoro() -> PomodoroTimer {
        PomodoroTimer::new(TimerSettings {
            focus_time: 1,
            break_time: 2,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_completes() -> Result<()> {
        *TEST_LOGGING;
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|v| v.sound == Some(SoundKind::Break))
            .times(1)
            .returning(|_| ());

        let shutdown = CancellationToken::new();
        let (handle, commands) = timer_channel(4);
        let driver = TimerDriver::new(
            "pomodoro",
            short_pomodoro(),
            commands,
            shutdown.clone(),
            Arc::new(TestClock::new()),
            notifier,
        );

        let (driver_result, script_result) = tokio::join!(driver.run(), async {
            let result = async {
                handle.toggle().await?;
                tokio::time::sleep(Duration::from_millis(30_500)).await;
                let snapshot = handle.snapshot().await?;
                assert!(snapshot.active);
                assert_eq!(snapshot.remaining, Duration::from_secs(30));

                tokio::time::sleep(Duration::from_secs(60)).await;
                let snapshot = handle.snapshot().await?;
                assert!(!snapshot.active);
                assert!(snapshot.on_break);
                assert_eq!(snapshot.remaining, Duration::from_secs(120));
                anyhow::Ok(())
            }
            .await;
            shutdown.cancel();
            result
        });
        driver_result?;
        script_result
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_timer_stays_put() -> Result<()> {
        *TEST_LOGGING;
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let shutdown = CancellationToken::new();
        let (handle, commands) = timer_channel(4);
        let driver = TimerDriver::new(
            "pomodoro",
            short_pomodoro(),
            commands,
            shutdown.clone(),
            Arc::new(TestClock::new()),
            notifier,
        );

        let (driver_result, script_result) = tokio::join!(driver.run(), async {
            let result = async {
                handle.toggle().await?;
                tokio::time::sleep(Duration::from_millis(10_500)).await;
                handle.toggle().await?;
                tokio::time::sleep(Duration::from_secs(600)).await;
                let snapshot = handle.snapshot().await?;
                assert!(!snapshot.active);
                assert!(!snapshot.on_break);
                assert_eq!(snapshot.remaining, Duration::from_millis(49_500));

                handle
                    .configure(TimerSettings {
                        focus_time: 3,
                        break_time: 1,
                    })
                    .await?;
                assert_eq!(handle.snapshot().await?.remaining, Duration::from_secs(180));
                anyhow::Ok(())
            }
            .await;
            shutdown.cancel();
            result
        });
        driver_result?;
        script_result
    }
}
