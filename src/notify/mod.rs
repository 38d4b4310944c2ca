//! The notification capability used by timers and the focus monitor. The host decides what a
//! notification looks like; the engine only says what happened and which sound fits.

pub mod sound;

use std::{
    io::Write,
    ops::Deref,
    sync::{Mutex, PoisonError},
};

use ansi_term::Style;
use tracing::{debug, info};

use crate::settings::SoundKind;

use sound::{SoundCue, SoundManager};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub sound: Option<SoundKind>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            sound: None,
        }
    }

    pub fn with_sound(self, sound: SoundKind) -> Self {
        Self {
            sound: Some(sound),
            ..self
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    fn notify(&self, notification: &Notification);

    /// Starts or stops the ambient sound of a focus session.
    fn set_background_sound(&self, playing: bool);
}

impl<T: Deref> Notifier for T
where
    T::Target: Notifier,
{
    fn notify(&self, notification: &Notification) {
        self.deref().notify(notification)
    }

    fn set_background_sound(&self, playing: bool) {
        self.deref().set_background_sound(playing)
    }
}

/// Prints notifications to the terminal and rings the bell when a sound would play.
pub struct TerminalNotifier {
    sounds: SoundManager,
    background: Mutex<Option<SoundCue>>,
}

impl TerminalNotifier {
    pub fn new(sounds: SoundManager) -> Self {
        Self {
            sounds,
            background: Mutex::new(None),
        }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) {
        info!("Notification {:?}: {}", notification.title, notification.message);
        let cue = notification.sound.and_then(|kind| self.sounds.cue(kind));
        let mut stdout = std::io::stdout().lock();
        let bell = if cue.is_some() { "\x07" } else { "" };
        let _ = writeln!(
            stdout,
            "{bell}{} {}",
            Style::new().bold().paint(notification.title.as_str()),
            notification.message
        );
        if let Some(cue) = cue {
            debug!("Playing {} at volume {:.2}", cue.resource, cue.volume);
        }
    }

    fn set_background_sound(&self, playing: bool) {
        let mut background = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match (playing, background.as_ref()) {
            (true, None) => {
                *background = self.sounds.background_cue();
                if let Some(cue) = background.as_ref() {
                    info!("Starting background sound {} at {:.2}", cue.resource, cue.volume);
                }
            }
            (false, Some(cue)) => {
                info!("Stopping background sound {}", cue.resource);
                *background = None;
            }
            _ => {}
        }
    }
}
