//! Remote-control indicator idle timer.
//!
//! The indicator shows up on every key press and hides after a period
//! without keys. There is no scheduled timer: expiry is checked lazily when
//! the next non-key message is handled.

use std::time::{Duration, Instant};

/// Visibility state of the remote-control indicator.
#[derive(Debug, Clone)]
pub struct RemoteControlIndicator {
    /// When the indicator should hide (None if no key is pending expiry).
    deadline: Option<Instant>,
    visible: bool,
    timeout: Duration,
}

impl Default for RemoteControlIndicator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl RemoteControlIndicator {
    /// One minute without keys.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: None,
            visible: false,
            timeout,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A key was pressed: show and restart the countdown.
    pub fn key_pressed(&mut self, now: Instant) {
        self.visible = true;
        self.deadline = Some(now + self.timeout);
    }

    /// Shows the indicator without a countdown (one-seg services keep it on screen).
    pub fn pin_visible(&mut self) {
        self.visible = true;
    }

    /// Checks the countdown for a non-key message.
    ///
    /// Returns `true` when the indicator just went hidden. Nothing expires
    /// while `suspended` (one-seg services).
    pub fn expire(&mut self, now: Instant, suspended: bool) -> bool {
        if suspended {
            return false;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.visible = false;
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
