use tracing::warn;

use crate::settings::{SoundKind, SoundSettings};

/// Background ambience plays quieter than notifications.
const BACKGROUND_VOLUME_FACTOR: f64 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct SoundCue {
    pub kind: SoundKind,
    pub resource: String,
    pub volume: f64,
    pub looping: bool,
}

/// Decides whether and how a sound should be played. Actual playback belongs to the host.
#[derive(Debug, Clone)]
pub struct SoundManager {
    settings: SoundSettings,
}

impl SoundManager {
    pub fn new(settings: SoundSettings) -> Self {
        Self { settings }
    }

    pub fn cue(&self, kind: SoundKind) -> Option<SoundCue> {
        if !self.settings.enabled || !self.settings.notification_sounds {
            return None;
        }
        let Some(resource) = self.settings.custom_sounds.get(&kind) else {
            warn!("No sound defined for type: {kind}");
            return None;
        };
        Some(SoundCue {
            kind,
            resource: resource.clone(),
            volume: self.settings.volume,
            looping: false,
        })
    }

    /// Ambient sound for a running focus session, if the user asked for one.
    pub fn background_cue(&self) -> Option<SoundCue> {
        if !self.settings.enabled || !self.settings.focus_background_sound {
            return None;
        }
        let resource = self.settings.custom_sounds.get(&SoundKind::Focus)?;
        Some(SoundCue {
            kind: SoundKind::Focus,
            resource: resource.clone(),
            volume: self.settings.volume * BACKGROUND_VOLUME_FACTOR,
            looping: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::{SoundKind, SoundSettings};

    use super::SoundManager;

    #[test]
    fn test_cue_respects_switches() {
        let manager = SoundManager::new(SoundSettings::default());
        let cue = manager.cue(SoundKind::EyeCare).unwrap();
        assert_eq!(cue.resource, "/calming.mp3");
        assert_eq!(cue.volume, 0.7);
        assert!(!cue.looping);

        let muted = SoundManager::new(SoundSettings {
            notification_sounds: false,
            ..Default::default()
        });
        assert_eq!(muted.cue(SoundKind::Break), None);

        let mut missing = SoundSettings::default();
        missing.custom_sounds.remove(&SoundKind::Distraction);
        assert_eq!(SoundManager::new(missing).cue(SoundKind::Distraction), None);
    }

    #[test]
    fn test_background_cue() {
        assert_eq!(SoundManager::new(SoundSettings::default()).background_cue(), None);

        let manager = SoundManager::new(SoundSettings {
            focus_background_sound: true,
            volume: 0.5,
            ..Default::default()
        });
        let cue = manager.background_cue().unwrap();
        assert_eq!(cue.resource, "/focus-ambient.mp3");
        assert!((cue.volume - 0.2).abs() < f64::EPSILON);
        assert!(cue.looping);
    }
}
