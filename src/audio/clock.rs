use std::time::{Duration, Instant};

/// Media-time clock for the current track.
///
/// While running, media time advances at `speed` times wall-clock time.
/// Every speed change or pause folds the elapsed span into `anchor`, so
/// earlier spans keep the speed they were played at.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    anchor: Duration,
    started_at: Option<Instant>,
    speed: f32,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            anchor: Duration::ZERO,
            started_at: None,
            speed: 1.0,
        }
    }
}

impl PlaybackClock {
    pub fn position_at(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(st) => self.anchor + now.saturating_duration_since(st).mul_f32(self.speed),
            None => self.anchor,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        self.anchor = self.position_at(now);
        self.started_at = None;
    }

    pub fn seek(&mut self, position: Duration, now: Instant) {
        self.anchor = position;
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
    }

    pub fn set_speed(&mut self, speed: f32, now: Instant) {
        self.anchor = self.position_at(now);
        if self.started_at.is_some() {
            self.started_at = Some(now);
        }
        self.speed = speed;
    }

    /// Stop and rewind to `position`; speed is kept.
    pub fn reset(&mut self, position: Duration) {
        self.anchor = position;
        self.started_at = None;
    }
}
