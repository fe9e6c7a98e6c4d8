use std::time::{Duration, Instant};

use tracing::warn;

/// What the user asked the sleep timer to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SleepMode {
    Off,
    /// Stop when the current track ends instead of advancing.
    EndOfTrack,
    /// Pause once this much wall-clock time has passed.
    After(Duration),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
enum Armed {
    #[default]
    Off,
    EndOfTrack,
    Deadline(Instant),
}

#[derive(Debug, Default)]
pub struct SleepTimer {
    armed: Armed,
}

impl SleepTimer {
    pub fn set(&mut self, mode: SleepMode, now: Instant) {
        self.armed = match mode {
            SleepMode::Off => Armed::Off,
            SleepMode::EndOfTrack => Armed::EndOfTrack,
            SleepMode::After(d) => match now.checked_add(d) {
                Some(at) => Armed::Deadline(at),
                None => {
                    warn!(?d, "sleep duration out of range, timer not armed");
                    Armed::Off
                }
            },
        };
    }

    pub fn clear(&mut self) {
        self.armed = Armed::Off;
    }

    pub fn is_armed(&self) -> bool {
        self.armed != Armed::Off
    }

    pub fn stop_at_end(&self) -> bool {
        self.armed == Armed::EndOfTrack
    }

    pub fn expired(&self, now: Instant) -> bool {
        matches!(self.armed, Armed::Deadline(at) if now >= at)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.armed {
            Armed::Deadline(at) => Some(at.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Countdown line for the notification.
    pub fn aux_text(&self, now: Instant) -> Option<String> {
        match self.armed {
            Armed::Off => None,
            Armed::EndOfTrack => Some("Stopping after this track".to_string()),
            Armed::Deadline(at) => {
                let secs = at.saturating_duration_since(now).as_secs();
                Some(format!("Sleep in {:02}:{:02}", secs / 60, secs % 60))
            }
        }
    }
}
