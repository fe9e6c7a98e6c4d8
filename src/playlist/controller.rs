use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::{
    Completion, MAX_SPEED, MIN_SPEED, OpenResult, PlaybackEngine, PlaybackState, PrepareOutcome,
    SessionHandle,
};
use crate::error::{PlaybackError, Result};
use crate::focus::{FocusArbiter, FocusGrant, Interruption};
use crate::library::Track;
use crate::mpris::{NotificationPresenter, NowPlaying};

use super::model::Playlist;
use super::sleep::{SleepMode, SleepTimer};
use super::timers::{TickFn, TimerKind, TimerScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub autosave_interval: Duration,
    pub refresh_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(1),
        }
    }
}

/// Owns the engine and the playlist, and decides what plays next.
///
/// Not thread-safe on purpose: one thread owns it and everything else sends
/// it commands.
pub struct PlaylistController {
    engine: PlaybackEngine,
    playlist: Playlist,
    focus: Box<dyn FocusArbiter>,
    presenter: Box<dyn NotificationPresenter>,
    sleep: SleepTimer,
    timers: Option<TimerScope>,
    tick: TickFn,
    settings: ControllerSettings,
}

impl PlaylistController {
    pub fn new(
        engine: PlaybackEngine,
        focus: Box<dyn FocusArbiter>,
        presenter: Box<dyn NotificationPresenter>,
        tick: TickFn,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            engine,
            playlist: Playlist::default(),
            focus,
            presenter,
            sleep: SleepTimer::default(),
            timers: None,
            tick,
            settings,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.engine.session_handle()
    }

    pub fn timers_running(&self) -> bool {
        self.timers.is_some()
    }

    pub fn holds_focus(&self) -> bool {
        self.focus.holds_focus()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.engine
            .current_id()
            .and_then(|id| self.playlist.index_of(id))
    }

    /// Replace the playlist and start playing `tracks[start_at]`.
    pub fn set_playlist(&mut self, tracks: Vec<Track>, start_at: usize) -> Result<()> {
        if tracks.is_empty() {
            return Err(PlaybackError::EmptyPlaylist);
        }
        if start_at >= tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds {
                index: start_at,
                len: tracks.len(),
            });
        }
        info!(len = tracks.len(), start_at, "playlist replaced");
        self.playlist = Playlist::new(tracks);
        self.load_at(start_at)
    }

    /// Advance to the next track. False, with nothing changed, at the end of the list.
    pub fn next(&mut self) -> bool {
        match self.current_index() {
            Some(i) if i + 1 < self.playlist.len() => {
                self.navigate(i + 1);
                true
            }
            _ => false,
        }
    }

    /// Go back one track. False, with nothing changed, at the start of the list.
    pub fn previous(&mut self) -> bool {
        match self.current_index() {
            Some(i) if i > 0 => {
                self.navigate(i - 1);
                true
            }
            _ => false,
        }
    }

    fn navigate(&mut self, index: usize) {
        // The failure already reached the error callback; the session is Idle.
        if let Err(e) = self.load_at(index) {
            debug!(index, error = %e, "navigation target did not load");
        }
    }

    fn load_at(&mut self, index: usize) -> Result<()> {
        let track = self
            .playlist
            .get(index)
            .cloned()
            .ok_or(PlaybackError::IndexOutOfBounds {
                index,
                len: self.playlist.len(),
            })?;
        self.load(track)
    }

    fn load(&mut self, track: Track) -> Result<()> {
        if self.focus.request() == FocusGrant::Denied {
            self.engine.stop();
            self.focus.abandon();
            self.sync();
            return Err(PlaybackError::FocusDenied);
        }
        let result = self.engine.load(track, true);
        if result.is_err() {
            self.focus.abandon();
        }
        self.sync();
        result
    }

    /// A background prepare finished.
    pub fn on_prepared(&mut self, generation: u64, result: OpenResult) -> Result<PrepareOutcome> {
        let outcome = self.engine.finish_prepare(generation, result);
        if outcome.is_err() {
            self.focus.abandon();
        }
        self.sync();
        outcome
    }

    /// Start or resume. From Idle, reloads the last track from its saved offset.
    pub fn play(&mut self) -> Result<()> {
        if self.engine.state() == PlaybackState::Idle {
            let Some(track) = self.engine.current_track().cloned() else {
                return Err(PlaybackError::NoTrackLoaded);
            };
            return self.load(track);
        }
        if self.focus.request() == FocusGrant::Denied {
            return Err(PlaybackError::FocusDenied);
        }
        let result = self.engine.play();
        self.sync();
        result
    }

    pub fn pause(&mut self) -> Result<()> {
        let result = self.engine.pause();
        self.sync();
        result
    }

    pub fn toggle_pause(&mut self) -> Result<()> {
        if self.engine.state() == PlaybackState::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn seek(&mut self, offset: Duration) -> Result<Duration> {
        let result = self.engine.seek(offset);
        self.sync();
        result
    }

    pub fn rewind(&mut self, by: Duration) -> Result<Duration> {
        let result = self.engine.rewind(by);
        self.sync();
        result
    }

    pub fn fast_forward(&mut self, by: Duration) -> Result<Duration> {
        let result = self.engine.fast_forward(by);
        self.sync();
        result
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        let result = self.engine.set_speed(speed);
        self.sync();
        result
    }

    /// Change the speed by `delta`, clamped to the supported range.
    pub fn nudge_speed(&mut self, delta: f32) -> Result<()> {
        let target = (self.engine.speed() + delta).clamp(MIN_SPEED, MAX_SPEED);
        self.set_speed(target)
    }

    pub fn set_sleep(&mut self, mode: SleepMode) {
        info!(?mode, "sleep timer set");
        self.sleep.set(mode, Instant::now());
        self.sync();
    }

    /// Flip stop-at-end against what is armed now; it disarms itself once it fires.
    pub fn toggle_stop_at_end(&mut self) {
        let mode = if self.sleep.stop_at_end() {
            SleepMode::Off
        } else {
            SleepMode::EndOfTrack
        };
        self.set_sleep(mode);
    }

    /// Release the resource and focus and withdraw the notification. The playlist stays.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.sleep.clear();
        self.focus.abandon();
        self.stop_timers();
        self.presenter.clear();
    }

    /// Final teardown: stop and wait for every pending position write.
    pub fn release(&mut self) {
        self.stop();
        self.engine.flush_positions();
    }

    /// Fade out (when playing), then release.
    pub fn shutdown(&mut self, fade: Duration) {
        self.engine.fade_out(fade);
        self.release();
    }

    /// Every interruption pauses; nothing resumes automatically and focus is kept.
    pub fn on_interruption(&mut self, interruption: Interruption) {
        info!(?interruption, state = ?self.engine.state(), "playback interrupted");
        if matches!(
            self.engine.state(),
            PlaybackState::Playing | PlaybackState::Preparing
        ) {
            if let Err(e) = self.engine.pause() {
                warn!(error = %e, "pause on interruption failed");
            }
        }
        // Focus stays held as long as the paused resource does.
        self.sync();
    }

    /// Check the resource for natural completion and act on it.
    pub fn poll(&mut self) {
        if let Some(done) = self.engine.poll_completion() {
            self.handle_completion(done);
        }
    }

    pub fn handle_completion(&mut self, done: Completion) {
        if done.generation != self.engine.generation() {
            debug!(
                generation = done.generation,
                latest = self.engine.generation(),
                "ignoring stale completion"
            );
            return;
        }
        if self.sleep.stop_at_end() {
            info!(track = %done.track_id, "stopping at end of track");
            self.sleep.clear();
            self.settle();
            return;
        }
        if !self.next() {
            info!("end of playlist");
            self.settle();
        }
    }

    fn settle(&mut self) {
        self.engine.settle();
        self.focus.abandon();
        self.sync();
    }

    pub fn on_tick(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Autosave => self.autosave(),
            TimerKind::Refresh => self.refresh_notification(),
        }
    }

    /// Persist the position; also where an expired sleep deadline takes effect.
    pub fn autosave(&mut self) {
        self.engine.save_position();
        if self.sleep.expired(Instant::now()) {
            info!("sleep timer expired");
            self.sleep.clear();
            if let Err(e) = self.pause() {
                debug!(error = %e, "nothing to pause for sleep timer");
            }
        }
    }

    pub fn refresh_notification(&self) {
        self.presenter.update(&self.now_playing());
    }

    pub fn now_playing(&self) -> NowPlaying {
        let index = self.current_index();
        NowPlaying {
            track: self.engine.current_track().cloned(),
            playing: self.engine.state() == PlaybackState::Playing,
            has_prev: index.is_some_and(|i| i > 0),
            has_next: index.is_some_and(|i| i + 1 < self.playlist.len()),
            aux_text: self.sleep.aux_text(Instant::now()),
            position: self.engine.position(),
            speed: self.engine.speed(),
        }
    }

    /// Timers run exactly while Playing; the presenter always gets the latest projection.
    fn sync(&mut self) {
        if self.engine.state() == PlaybackState::Playing {
            if self.timers.is_none() {
                self.timers = Some(TimerScope::start(
                    self.settings.autosave_interval,
                    self.settings.refresh_interval,
                    self.tick.clone(),
                ));
            }
        } else {
            self.stop_timers();
        }
        self.refresh_notification();
    }

    fn stop_timers(&mut self) {
        if let Some(t) = self.timers.take() {
            t.cancel();
        }
    }
}
