use std::{sync::Arc, time::Duration};

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    notify::{sound::SoundManager, TerminalNotifier},
    settings::{EyeCareSettings, TimerSettings},
    storage::{
        preferences::{Preferences, PreferencesStore},
        session_log::SessionLogStore,
    },
    timers::{
        driver::{timer_channel, TimerDriver, TimerHandle},
        eye_care::EyeCareReminder,
        pomodoro::PomodoroTimer,
    },
    tracking::{
        activity::{ActivityHub, ActivitySignal},
        distraction::DetectorConfig,
        monitor::{monitor_channel, FocusMonitor, MonitorConfig, MonitorHandle},
        tracker::SessionTracker,
    },
    utils::{
        clock::{Clock, DefaultClock},
        shutdown::detect_shutdown,
        time::format_duration,
    },
};

const ACTIVITY_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 8;
const MANUAL_LABEL: &str = "self-reported";

#[derive(Debug, Clone, clap::Args)]
pub struct RunCommand {
    #[arg(
        long,
        default_value_t = 60,
        help = "Seconds without mouse activity before you count as distracted"
    )]
    mouse_threshold: u64,
    #[arg(
        long,
        default_value_t = 120,
        help = "Seconds without typing before you count as distracted"
    )]
    keyboard_threshold: u64,
    #[arg(
        long,
        default_value_t = 300,
        help = "Seconds without any input before you count as away"
    )]
    idle_threshold: u64,
    #[arg(long, help = "Don't start eye care reminders")]
    no_eye_care: bool,
}

impl RunCommand {
    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            detector: DetectorConfig {
                mouse_threshold: Duration::from_secs(self.mouse_threshold),
                keyboard_threshold: Duration::from_secs(self.keyboard_threshold),
            },
            idle_threshold: Duration::from_secs(self.idle_threshold),
        }
    }
}

/// One line of dashboard input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DashboardInput {
    Activity(ActivitySignal),
    Start(String),
    End,
    Distracted(Option<String>),
    Pomodoro,
    PomodoroReset,
    Eyes,
    EyesReset,
    Reload,
    Status,
    Quit,
    Empty,
    Unknown(String),
}

impl DashboardInput {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let rest = (!rest.is_empty()).then(|| rest.to_owned());

        match (word, rest) {
            ("", _) => DashboardInput::Empty,
            ("start", Some(task)) => DashboardInput::Start(task),
            ("end", None) => DashboardInput::End,
            ("distracted", note) => DashboardInput::Distracted(note),
            ("pomodoro", None) => DashboardInput::Pomodoro,
            ("pomodoro", Some(arg)) if arg == "reset" => DashboardInput::PomodoroReset,
            ("eyes", None) => DashboardInput::Eyes,
            ("eyes", Some(arg)) if arg == "reset" => DashboardInput::EyesReset,
            ("reload", None) => DashboardInput::Reload,
            ("status", None) => DashboardInput::Status,
            ("quit" | "exit", None) => DashboardInput::Quit,
            (word, None) => match word.parse() {
                Ok(signal) => DashboardInput::Activity(signal),
                Err(_) => DashboardInput::Unknown(line.to_owned()),
            },
            _ => DashboardInput::Unknown(line.to_owned()),
        }
    }
}

const HELP: &str = "Commands: start <task>, end, distracted [note], pomodoro [reset], eyes [reset], \
reload, status, quit. Activity: mouse, click, scroll, touch, hide, show";

/// Everything the input loop can talk to.
struct Dashboard<P> {
    hub: ActivityHub,
    monitor: MonitorHandle,
    pomodoro: TimerHandle<TimerSettings>,
    eyes: Option<TimerHandle<EyeCareSettings>>,
    preferences: Preferences<P>,
    clock: Arc<dyn Clock>,
}

impl<P: PreferencesStore> Dashboard<P> {
    /// Returns `false` once the user asked to quit.
    async fn handle(&self, input: DashboardInput) -> Result<bool> {
        match input {
            DashboardInput::Activity(signal) => {
                self.hub.publish(signal);
            }
            DashboardInput::Start(task) => match self.monitor.start_session(&task).await? {
                Ok(_) => {}
                Err(e) => println!("{e}"),
            },
            DashboardInput::End => {
                if self.monitor.end_session().await?.is_none() {
                    println!("No open session");
                }
            }
            DashboardInput::Distracted(note) => {
                match self.monitor.distracted(MANUAL_LABEL, note).await? {
                    Some(event) => println!(
                        "Recorded: {}",
                        event.notes.as_deref().unwrap_or(event.kind.label())
                    ),
                    None => println!("No open session to record a distraction on"),
                }
            }
            DashboardInput::Pomodoro => self.pomodoro.toggle().await?,
            DashboardInput::PomodoroReset => self.pomodoro.reset().await?,
            DashboardInput::Eyes => match &self.eyes {
                Some(eyes) => eyes.toggle().await?,
                None => println!("Eye care is disabled"),
            },
            DashboardInput::EyesReset => match &self.eyes {
                Some(eyes) => eyes.reset().await?,
                None => println!("Eye care is disabled"),
            },
            DashboardInput::Reload => self.reload_settings().await?,
            DashboardInput::Status => self.print_status().await?,
            DashboardInput::Quit => return Ok(false),
            DashboardInput::Empty => {}
            DashboardInput::Unknown(line) => {
                warn!("Unknown input {line:?}");
                println!("Unknown command {line:?}. {HELP}");
            }
        }
        Ok(true)
    }

    /// Picks up settings saved since the dashboard started, for example with `settings timer`.
    /// A running timer keeps its current phase and uses the new durations from the next one.
    async fn reload_settings(&self) -> Result<()> {
        self.preferences.invalidate();
        let timer = self.preferences.timer().await;
        info!("Reloading settings, focus {}m break {}m", timer.focus_time, timer.break_time);
        self.pomodoro.configure(timer).await?;
        if let Some(eyes) = &self.eyes {
            eyes.configure(self.preferences.eye_care().await).await?;
        }
        println!("Settings reloaded");
        Ok(())
    }

    async fn print_status(&self) -> Result<()> {
        let status = self.monitor.status().await?;
        match &status.session {
            Some(session) => println!(
                "Session\t\t{} ({}, {} distractions)",
                session.task_name,
                format_duration(session.elapsed(self.clock.time())),
                session.distractions.len()
            ),
            None => println!("Session\t\tnone"),
        }
        match (status.distraction, status.idle) {
            (_, true) => println!("Attention\taway"),
            (Some(reason), false) => println!("Attention\tdistracted ({reason})"),
            (None, false) => println!("Attention\tfocused"),
        }
        println!("Pomodoro\t{}", self.pomodoro.snapshot().await?);
        if let Some(eyes) = &self.eyes {
            println!("Eye care\t{}", eyes.snapshot().await?);
        }
        Ok(())
    }

    /// Every line counts as typing. Stops on `quit`, end of input or shutdown, and takes the
    /// rest of the dashboard down with it.
    async fn read_input(&self, shutdown: CancellationToken) -> Result<()> {
        println!("{HELP}");
        let result = self.input_loop(&shutdown).await;
        shutdown.cancel();
        result
    }

    async fn input_loop(&self, shutdown: &CancellationToken) -> Result<()> {
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                line = lines.next() => line,
            };
            let Some(line) = line else {
                info!("Input closed");
                return Ok(());
            };
            self.hub.publish(ActivitySignal::KeyDown);
            if !self.handle(DashboardInput::parse(&line?)).await? {
                return Ok(());
            }
        }
    }
}

/// Runs the dashboard until `quit`, end of input or Ctrl-C.
pub async fn process_run_command(
    command: RunCommand,
    log: impl SessionLogStore,
    preferences: Preferences<impl PreferencesStore>,
) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let shutdown = CancellationToken::new();
    let hub = ActivityHub::new(ACTIVITY_CAPACITY);
    let notifier = TerminalNotifier::new(SoundManager::new(preferences.sound().await));

    let (monitor_handle, monitor_commands) = monitor_channel(COMMAND_CAPACITY);
    let monitor = FocusMonitor::new(
        SessionTracker::new(log, clock.clone()),
        command.monitor_config(),
        &hub,
        monitor_commands,
        shutdown.clone(),
        clock.clone(),
        &notifier,
    );

    let (pomodoro_handle, pomodoro_commands) = timer_channel(COMMAND_CAPACITY);
    let pomodoro = TimerDriver::new(
        "Pomodoro",
        PomodoroTimer::new(preferences.timer().await),
        pomodoro_commands,
        shutdown.clone(),
        clock.clone(),
        &notifier,
    );

    let (eyes_handle, eyes_commands) = timer_channel(COMMAND_CAPACITY);
    let eyes = TimerDriver::new(
        "Eye care",
        EyeCareReminder::new(preferences.eye_care().await),
        eyes_commands,
        shutdown.clone(),
        clock.clone(),
        &notifier,
    );
    if !command.no_eye_care {
        eyes_handle.toggle().await?;
    }

    let dashboard = Dashboard {
        hub: hub.clone(),
        monitor: monitor_handle,
        pomodoro: pomodoro_handle,
        eyes: (!command.no_eye_care).then_some(eyes_handle),
        preferences,
        clock,
    };

    let (_, monitor_result, pomodoro_result, eyes_result, input_result) = tokio::join!(
        detect_shutdown(shutdown.clone()),
        monitor.run(),
        pomodoro.run(),
        eyes.run(),
        dashboard.read_input(shutdown.clone()),
    );

    for (name, result) in [
        ("Focus monitor", monitor_result),
        ("Pomodoro", pomodoro_result),
        ("Eye care", eyes_result),
    ] {
        if let Err(e) = result {
            error!("{name} got an error {e:?}");
        }
    }
    input_result
}
