use anyhow::Result;
use clap::Subcommand;

use crate::{
    settings::{EyeCareSettings, SoundSettings, TimerSettings},
    storage::preferences::{Preferences, PreferencesStore},
};

#[derive(Debug, Clone, Default, clap::Args)]
pub struct TimerArgs {
    #[arg(long, help = "Focus phase in minutes")]
    focus: Option<u32>,
    #[arg(long = "break", help = "Break phase in minutes")]
    break_time: Option<u32>,
}

impl TimerArgs {
    fn merge(self, current: TimerSettings) -> TimerSettings {
        TimerSettings {
            focus_time: self.focus.unwrap_or(current.focus_time),
            break_time: self.break_time.unwrap_or(current.break_time),
        }
    }
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct EyeCareArgs {
    #[arg(long, help = "Minutes between eye breaks")]
    eye_break_interval: Option<u32>,
    #[arg(long, help = "Seconds an eye break lasts")]
    eye_break_duration: Option<u32>,
    #[arg(long, help = "Minutes between blink reminders")]
    blink_interval: Option<u32>,
    #[arg(long, help = "Minutes between screen breaks")]
    screen_break_interval: Option<u32>,
    #[arg(long, help = "Seconds a screen break lasts")]
    screen_break_duration: Option<u32>,
    #[arg(long, help = "Play a sound with eye care reminders")]
    play_sounds: Option<bool>,
}

impl EyeCareArgs {
    fn merge(self, current: EyeCareSettings) -> EyeCareSettings {
        EyeCareSettings {
            eye_break_interval: self.eye_break_interval.unwrap_or(current.eye_break_interval),
            eye_break_duration: self.eye_break_duration.unwrap_or(current.eye_break_duration),
            blink_interval: self.blink_interval.unwrap_or(current.blink_interval),
            screen_break_interval: self
                .screen_break_interval
                .unwrap_or(current.screen_break_interval),
            screen_break_duration: self
                .screen_break_duration
                .unwrap_or(current.screen_break_duration),
            play_sounds: self.play_sounds.unwrap_or(current.play_sounds),
        }
    }
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct SoundArgs {
    #[arg(long, help = "Turn all sounds on or off")]
    enabled: Option<bool>,
    #[arg(long, help = "Volume between 0 and 1")]
    volume: Option<f64>,
    #[arg(long, help = "Play ambient sound during focus sessions")]
    background: Option<bool>,
    #[arg(long, help = "Play sounds with notifications")]
    notification_sounds: Option<bool>,
}

impl SoundArgs {
    fn merge(self, current: SoundSettings) -> SoundSettings {
        SoundSettings {
            enabled: self.enabled.unwrap_or(current.enabled),
            volume: self.volume.unwrap_or(current.volume),
            focus_background_sound: self.background.unwrap_or(current.focus_background_sound),
            notification_sounds: self
                .notification_sounds
                .unwrap_or(current.notification_sounds),
            custom_sounds: current.custom_sounds,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    #[command(about = "Print every settings record")]
    Show,
    #[command(about = "Change pomodoro durations")]
    Timer {
        #[command(flatten)]
        args: TimerArgs,
    },
    #[command(about = "Change eye care reminders")]
    EyeCare {
        #[command(flatten)]
        args: EyeCareArgs,
    },
    #[command(about = "Change sound settings")]
    Sound {
        #[command(flatten)]
        args: SoundArgs,
    },
}

/// Loads the current record, applies the given fields on top and saves it back.
pub async fn process_settings_command(
    command: SettingsCommand,
    preferences: &Preferences<impl PreferencesStore>,
) -> Result<()> {
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Timer { args } => {
            let settings = args.merge(preferences.timer().await);
            preferences.save_timer(settings).await?;
        }
        SettingsCommand::EyeCare { args } => {
            let settings = args.merge(preferences.eye_care().await);
            preferences.save_eye_care(settings).await?;
        }
        SettingsCommand::Sound { args } => {
            let settings = args.merge(preferences.sound().await);
            preferences.save_sound(settings).await?;
        }
    }

    println!("timer {}", serde_json::to_string_pretty(&preferences.timer().await)?);
    println!("eye-care {}", serde_json::to_string_pretty(&preferences.eye_care().await)?);
    println!("sound {}", serde_json::to_string_pretty(&preferences.sound().await)?);
    Ok(())
}
