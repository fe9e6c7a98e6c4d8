//! The playback engine: one prepared resource at a time, a speed-aware clock,
//! and position persistence.
//!
//! Every prepare bumps a generation counter. Results and completions carry the
//! generation they belong to; anything older than the latest prepare is dropped
//! on arrival, which is what keeps at most one resource live.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{PlaybackError, Result};
use crate::library::{Track, TrackId};
use crate::store::PositionStore;

use super::backend::{MediaBackend, MediaResource};
use super::clock::PlaybackClock;
use super::types::{
    AudioCmd, OpenResult, PlaybackSession, PlaybackState, SessionHandle, speed_in_range,
};

const FADE_STEPS: u32 = 20;

/// Where resources get opened.
pub enum PrepareMode {
    /// On the calling thread; the prepare finishes before `load` returns.
    Inline,
    /// On a worker thread; the result comes back as [`AudioCmd::Prepared`].
    Background(Sender<AudioCmd>),
}

#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub generation: u64,
    pub track: Track,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    Ready { resumed_at: Duration },
    /// A newer prepare started meanwhile; the resource was released.
    Superseded,
}

/// A track ran to its natural end.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Completion {
    pub generation: u64,
    pub track_id: TrackId,
}

pub type ErrorCallback = Box<dyn Fn(&PlaybackError) + Send>;

struct Pending {
    generation: u64,
    autoplay: bool,
}

pub struct PlaybackEngine {
    backend: Arc<dyn MediaBackend>,
    positions: Arc<PositionStore>,
    mode: PrepareMode,
    session: SessionHandle,
    resource: Option<Box<dyn MediaResource>>,
    pending: Option<Pending>,
    track: Option<Track>,
    state: PlaybackState,
    clock: PlaybackClock,
    generation: u64,
    speed: f32,
    resume_positions: bool,
    on_error: Option<ErrorCallback>,
}

impl PlaybackEngine {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        positions: Arc<PositionStore>,
        mode: PrepareMode,
    ) -> Self {
        Self {
            backend,
            positions,
            mode,
            session: Arc::new(Mutex::new(PlaybackSession::default())),
            resource: None,
            pending: None,
            track: None,
            state: PlaybackState::Idle,
            clock: PlaybackClock::default(),
            generation: 0,
            speed: 1.0,
            resume_positions: true,
            on_error: None,
        }
    }

    pub fn with_resume_positions(mut self, resume: bool) -> Self {
        self.resume_positions = resume;
        self
    }

    /// Speed applied to every prepared track. Out-of-range values are ignored.
    pub fn with_speed(mut self, speed: f32) -> Self {
        if speed_in_range(speed) {
            self.speed = speed;
            self.clock.set_speed(speed, Instant::now());
        }
        self
    }

    /// Called for every open/decode failure, in addition to the returned error.
    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The prepared (or remembered, when Idle after a completion) track.
    pub fn current_track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn current_id(&self) -> Option<TrackId> {
        self.track.as_ref().map(|t| t.id)
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn duration(&self) -> Option<Duration> {
        self.track.as_ref().and_then(|t| t.duration)
    }

    pub fn position(&self) -> Duration {
        self.clamp(self.clock.position_at(Instant::now()))
    }

    fn clamp(&self, position: Duration) -> Duration {
        match self.duration() {
            Some(d) if !d.is_zero() => position.min(d),
            _ => position,
        }
    }

    /// Prepare `track` on the calling thread, returning the offset playback will start from.
    pub fn prepare(&mut self, track: Track) -> Result<Duration> {
        let request = self.begin_prepare(track, false);
        let result = self.backend.open(&request.track);
        self.adopt(result)
    }

    /// Prepare `track` according to the engine's [`PrepareMode`].
    ///
    /// With `autoplay`, playback starts as soon as the prepare succeeds.
    pub fn load(&mut self, track: Track, autoplay: bool) -> Result<()> {
        let PrepareMode::Background(tx) = &self.mode else {
            let request = self.begin_prepare(track, autoplay);
            let result = self.backend.open(&request.track);
            return self.adopt(result).map(|_| ());
        };

        let tx = tx.clone();
        let backend = self.backend.clone();
        let request = self.begin_prepare(track, autoplay);
        let generation = request.generation;
        let spawned = thread::Builder::new()
            .name("audio-open".to_string())
            .spawn(move || {
                let result = backend.open(&request.track);
                let _ = tx.send(AudioCmd::Prepared { generation, result });
            });

        if let Err(e) = spawned {
            let err = PlaybackError::Output(format!("failed to spawn open worker: {e}"));
            self.pending = None;
            self.fail(&err);
            return Err(err);
        }
        Ok(())
    }

    /// First half of a prepare: release the current resource and start a new generation.
    pub fn begin_prepare(&mut self, track: Track, autoplay: bool) -> PrepareRequest {
        self.release();
        self.generation += 1;
        self.pending = Some(Pending {
            generation: self.generation,
            autoplay,
        });
        self.clock.reset(Duration::ZERO);
        self.state = PlaybackState::Preparing;
        debug!(track = %track.id, generation = self.generation, "preparing");
        self.track = Some(track.clone());
        self.publish();
        PrepareRequest {
            generation: self.generation,
            track,
        }
    }

    /// Second half of a prepare. Results for anything but the latest generation are released.
    pub fn finish_prepare(&mut self, generation: u64, result: OpenResult) -> Result<PrepareOutcome> {
        let latest = self.pending.as_ref().map(|p| p.generation);
        if latest != Some(generation) {
            debug!(generation, latest = ?latest, "discarding superseded prepare");
            drop(result);
            return Ok(PrepareOutcome::Superseded);
        }
        self.adopt(result)
            .map(|resumed_at| PrepareOutcome::Ready { resumed_at })
    }

    fn adopt(&mut self, result: OpenResult) -> Result<Duration> {
        let (Some(pending), Some(track)) = (self.pending.take(), self.track.as_ref()) else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        let (id, duration) = (track.id, track.duration);

        let mut resource = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(track = %id, error = %e, "prepare failed");
                self.fail(&e);
                return Err(e);
            }
        };

        resource.set_speed(self.speed);
        let resumed_at = self.restore_offset(resource.as_mut(), id, duration);
        self.resource = Some(resource);
        self.clock.reset(resumed_at);
        self.state = PlaybackState::Ready;
        self.publish();
        info!(track = %id, resumed_at = ?resumed_at, "prepared");

        if pending.autoplay {
            self.play()?;
        }
        Ok(resumed_at)
    }

    fn restore_offset(
        &self,
        resource: &mut dyn MediaResource,
        id: TrackId,
        duration: Option<Duration>,
    ) -> Duration {
        if !self.resume_positions {
            return Duration::ZERO;
        }
        let saved = match self.positions.get(id) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(track = %id, error = %e, "position not restored, starting from the beginning");
                return Duration::ZERO;
            }
        };
        if saved.is_zero() || duration.is_some_and(|d| saved >= d) {
            return Duration::ZERO;
        }
        match resource.seek(saved) {
            Ok(()) => saved,
            Err(e) => {
                warn!(track = %id, error = %e, "position not restored, starting from the beginning");
                Duration::ZERO
            }
        }
    }

    fn fail(&mut self, err: &PlaybackError) {
        self.resource = None;
        self.track = None;
        self.state = PlaybackState::Idle;
        self.clock.reset(Duration::ZERO);
        self.publish();
        if let Some(cb) = &self.on_error {
            cb(err);
        }
    }

    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Preparing => {
                if let Some(p) = self.pending.as_mut() {
                    p.autoplay = true;
                }
                Ok(())
            }
            PlaybackState::Ready | PlaybackState::Paused => {
                let Some(resource) = self.resource.as_mut() else {
                    return Err(PlaybackError::NoTrackLoaded);
                };
                resource.play();
                self.clock.start(Instant::now());
                self.state = PlaybackState::Playing;
                self.publish();
                Ok(())
            }
            PlaybackState::Playing => Ok(()),
            PlaybackState::Idle | PlaybackState::Completed => Err(PlaybackError::NoTrackLoaded),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Preparing => {
                if let Some(p) = self.pending.as_mut() {
                    p.autoplay = false;
                }
                Ok(())
            }
            PlaybackState::Playing => {
                if let Some(resource) = self.resource.as_mut() {
                    resource.pause();
                }
                self.clock.pause(Instant::now());
                self.state = PlaybackState::Paused;
                self.save_position();
                self.publish();
                Ok(())
            }
            PlaybackState::Ready | PlaybackState::Paused => Ok(()),
            PlaybackState::Idle | PlaybackState::Completed => Err(PlaybackError::NoTrackLoaded),
        }
    }

    /// Seek to `offset`, clamped to the track duration. Returns the applied offset.
    pub fn seek(&mut self, offset: Duration) -> Result<Duration> {
        let target = self.clamp(offset);
        let Some(resource) = self.resource.as_mut() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        resource.seek(target)?;
        self.clock.seek(target, Instant::now());
        self.publish();
        Ok(target)
    }

    pub fn rewind(&mut self, by: Duration) -> Result<Duration> {
        self.seek(self.position().saturating_sub(by))
    }

    pub fn fast_forward(&mut self, by: Duration) -> Result<Duration> {
        self.seek(self.position() + by)
    }

    /// Change playback speed. Duration is unaffected; only position pacing changes.
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        if !speed_in_range(speed) {
            return Err(PlaybackError::InvalidSpeed(speed));
        }
        self.speed = speed;
        self.clock.set_speed(speed, Instant::now());
        if let Some(resource) = self.resource.as_mut() {
            resource.set_speed(speed);
        }
        self.publish();
        Ok(())
    }

    /// Save the current position in the background.
    pub fn save_position(&self) {
        let Some(id) = self.current_id() else {
            return;
        };
        if self.resource.is_some()
            && matches!(
                self.state,
                PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
            )
        {
            self.positions.save_detached(id, self.position());
        }
    }

    /// Wait until every queued position write has landed.
    pub fn flush_positions(&self) {
        self.positions.flush();
    }

    /// Check for natural completion and refresh the published position.
    ///
    /// On completion the position entry is cleared, the resource released and the
    /// engine waits in `Completed` for the controller to [`settle`](Self::settle) or
    /// load another track.
    pub fn poll_completion(&mut self) -> Option<Completion> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let finished = self.resource.as_ref().is_some_and(|r| r.is_finished());
        if !finished {
            self.publish();
            return None;
        }

        let id = self.current_id()?;
        self.positions.clear_detached(id);
        self.release();
        let end = self.duration().unwrap_or_else(|| self.position());
        self.clock.reset(end);
        self.state = PlaybackState::Completed;
        self.publish();
        info!(track = %id, "track completed");
        Some(Completion {
            generation: self.generation,
            track_id: id,
        })
    }

    /// Leave `Completed` for `Idle`, remembering the finished track.
    pub fn settle(&mut self) {
        if self.state == PlaybackState::Completed {
            self.state = PlaybackState::Idle;
            self.clock.reset(Duration::ZERO);
            self.publish();
        }
    }

    /// Save the position, release the resource and forget the track.
    pub fn stop(&mut self) {
        self.save_position();
        self.release();
        self.pending = None;
        self.track = None;
        self.state = PlaybackState::Idle;
        self.clock.reset(Duration::ZERO);
        self.publish();
    }

    /// Ramp the volume down over `over`, blocking the caller.
    pub fn fade_out(&mut self, over: Duration) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(resource) = self.resource.as_mut() else {
            return;
        };
        if !over.is_zero() {
            let step = (over / FADE_STEPS).max(Duration::from_millis(1));
            for i in 1..=FADE_STEPS {
                resource.set_volume(1.0 - i as f32 / FADE_STEPS as f32);
                thread::sleep(step);
            }
        }
        resource.set_volume(0.0);
    }

    fn release(&mut self) {
        if self.resource.take().is_some() {
            debug!(generation = self.generation, "released resource");
        }
    }

    fn publish(&self) {
        if let Ok(mut s) = self.session.lock() {
            *s = PlaybackSession {
                track_id: self.current_id(),
                state: self.state,
                position: self.position(),
                duration: self.duration().unwrap_or_default(),
                speed: self.speed,
                generation: self.generation,
            };
        }
    }
}
