//! Input activity as seen by the detectors. The host decides where signals come from (a browser
//! page, a terminal, a test) and publishes them through an [ActivityHub].

use std::str::FromStr;

use anyhow::anyhow;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    PointerMove,
    PointerDown,
    Scroll,
    Touch,
    KeyDown,
    Visibility(Visibility),
}

/// Signal channels tracked separately by the distraction detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Pointer,
    Keyboard,
    Visibility,
}

impl ActivitySignal {
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ActivitySignal::PointerMove | ActivitySignal::PointerDown | ActivitySignal::Scroll => {
                Some(Channel::Pointer)
            }
            ActivitySignal::KeyDown => Some(Channel::Keyboard),
            ActivitySignal::Visibility(_) => Some(Channel::Visibility),
            ActivitySignal::Touch => None,
        }
    }

    /// Whether the signal means the user is physically interacting. Visibility changes are not.
    pub fn is_input(&self) -> bool {
        !matches!(self, ActivitySignal::Visibility(_))
    }
}

impl FromStr for ActivitySignal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mouse" | "move" => Ok(ActivitySignal::PointerMove),
            "click" => Ok(ActivitySignal::PointerDown),
            "scroll" => Ok(ActivitySignal::Scroll),
            "touch" => Ok(ActivitySignal::Touch),
            "key" => Ok(ActivitySignal::KeyDown),
            "hide" | "hidden" => Ok(ActivitySignal::Visibility(Visibility::Hidden)),
            "show" | "visible" => Ok(ActivitySignal::Visibility(Visibility::Visible)),
            other => Err(anyhow!("Unknown activity {other:?}")),
        }
    }
}

/// Something detectors can subscribe to. Dropping the receiver unsubscribes.
pub trait ActivitySource {
    fn subscribe(&self) -> broadcast::Receiver<ActivitySignal>;
}

/// Fan-out of activity signals to every subscriber.
#[derive(Clone)]
pub struct ActivityHub {
    sender: broadcast::Sender<ActivitySignal>,
}

impl ActivityHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many subscribers received the signal.
    pub fn publish(&self, signal: ActivitySignal) -> usize {
        self.sender.send(signal).unwrap_or(0)
    }
}

impl ActivitySource for ActivityHub {
    fn subscribe(&self) -> broadcast::Receiver<ActivitySignal> {
        self.sender.subscribe()
    }
}
