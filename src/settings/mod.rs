//! User-editable configuration records. Each record is stored under its own key and replaced
//! wholesale on save; see [crate::storage::preferences::Preferences] for the load/save
//! lifecycle.

use std::{collections::BTreeMap, fmt::Display, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{0} must be a positive number")]
    NotPositive(&'static str),
    #[error("volume must be between 0 and 1, got {0}")]
    Volume(f64),
}

/// A record that lives in the preferences store under [Preference::KEY].
pub trait Preference: Serialize + DeserializeOwned + Default + Clone {
    const KEY: &'static str;

    fn validate(&self) -> Result<(), SettingsError>;
}

fn positive(value: u32, field: &'static str) -> Result<(), SettingsError> {
    if value == 0 {
        Err(SettingsError::NotPositive(field))
    } else {
        Ok(())
    }
}

/// Pomodoro durations, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    pub focus_time: u32,
    pub break_time: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_time: 25,
            break_time: 5,
        }
    }
}

impl TimerSettings {
    pub fn focus_duration(&self) -> Duration {
        Duration::from_secs(self.focus_time as u64 * 60)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(self.break_time as u64 * 60)
    }
}

impl Preference for TimerSettings {
    const KEY: &'static str = "timer-settings";

    fn validate(&self) -> Result<(), SettingsError> {
        positive(self.focus_time, "focusTime")?;
        positive(self.break_time, "breakTime")
    }
}

/// Eye-care reminder configuration. Intervals are minutes, break durations are seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EyeCareSettings {
    pub eye_break_interval: u32,
    pub eye_break_duration: u32,
    pub blink_interval: u32,
    pub screen_break_interval: u32,
    pub screen_break_duration: u32,
    pub play_sounds: bool,
}

impl Default for EyeCareSettings {
    fn default() -> Self {
        // 20-20-20 rule for eye breaks.
        Self {
            eye_break_interval: 20,
            eye_break_duration: 20,
            blink_interval: 10,
            screen_break_interval: 60,
            screen_break_duration: 300,
            play_sounds: true,
        }
    }
}

impl Preference for EyeCareSettings {
    const KEY: &'static str = "eye-care-settings";

    fn validate(&self) -> Result<(), SettingsError> {
        positive(self.eye_break_interval, "eyeBreakInterval")?;
        positive(self.eye_break_duration, "eyeBreakDuration")?;
        positive(self.blink_interval, "blinkInterval")?;
        positive(self.screen_break_interval, "screenBreakInterval")?;
        positive(self.screen_break_duration, "screenBreakDuration")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    Notification,
    Focus,
    Break,
    EyeCare,
    Distraction,
}

impl Display for SoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoundKind::Notification => write!(f, "notification"),
            SoundKind::Focus => write!(f, "focus"),
            SoundKind::Break => write!(f, "break"),
            SoundKind::EyeCare => write!(f, "eyecare"),
            SoundKind::Distraction => write!(f, "distraction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundSettings {
    pub enabled: bool,
    pub volume: f64,
    pub focus_background_sound: bool,
    pub notification_sounds: bool,
    pub custom_sounds: BTreeMap<SoundKind, String>,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.7,
            focus_background_sound: false,
            notification_sounds: true,
            custom_sounds: BTreeMap::from([
                (SoundKind::Notification, "/notification.mp3".into()),
                (SoundKind::Focus, "/focus-ambient.mp3".into()),
                (SoundKind::Break, "/break-chime.mp3".into()),
                (SoundKind::EyeCare, "/calming.mp3".into()),
                (SoundKind::Distraction, "/gentle-alert.mp3".into()),
            ]),
        }
    }
}

impl Preference for SoundSettings {
    const KEY: &'static str = "sound-settings";

    fn validate(&self) -> Result<(), SettingsError> {
        if (0.0..=1.0).contains(&self.volume) {
            Ok(())
        } else {
            Err(SettingsError::Volume(self.volume))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EyeCareSettings, Preference, SettingsError, SoundKind, SoundSettings, TimerSettings,
    };

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(TimerSettings::default().validate(), Ok(()));
        assert_eq!(EyeCareSettings::default().validate(), Ok(()));
        assert_eq!(SoundSettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_validation_rejects_zero_and_out_of_range() {
        let timer = TimerSettings {
            focus_time: 0,
            break_time: 5,
        };
        assert_eq!(timer.validate(), Err(SettingsError::NotPositive("focusTime")));

        let eye_care = EyeCareSettings {
            screen_break_duration: 0,
            ..Default::default()
        };
        assert_eq!(
            eye_care.validate(),
            Err(SettingsError::NotPositive("screenBreakDuration"))
        );

        let sound = SoundSettings {
            volume: 1.5,
            ..Default::default()
        };
        assert_eq!(sound.validate(), Err(SettingsError::Volume(1.5)));
    }

    #[test]
    fn test_partial_record_fills_defaults() -> anyhow::Result<()> {
        let timer: TimerSettings = serde_json::from_str(r#"{"focusTime": 50}"#)?;
        assert_eq!(timer.focus_time, 50);
        assert_eq!(timer.break_time, 5);

        let sound: SoundSettings =
            serde_json::from_str(r#"{"volume": 0.2, "customSounds": {"eyecare": "/rain.mp3"}}"#)?;
        assert_eq!(sound.custom_sounds[&SoundKind::EyeCare], "/rain.mp3");
        assert!(!sound.custom_sounds.contains_key(&SoundKind::Focus));
        Ok(())
    }
}
