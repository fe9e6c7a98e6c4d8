//! Audio-related small types and handles.
//!
//! This module defines the session snapshot shared with the host, the
//! command enum consumed by the audio thread, and a few helpers.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PlaybackError;
use crate::focus::Interruption;
use crate::library::{Track, TrackId};
use crate::playlist::{SleepMode, TimerKind};

use super::backend::MediaResource;

pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;

pub fn speed_in_range(speed: f32) -> bool {
    speed.is_finite() && (MIN_SPEED..=MAX_SPEED).contains(&speed)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing prepared.
    #[default]
    Idle,
    /// A resource is being opened; see the session generation.
    Preparing,
    /// Prepared and positioned, not yet started.
    Ready,
    Playing,
    Paused,
    /// The resource ran dry; the controller decides what comes next.
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
/// Snapshot of the single playback session, published for readers.
pub struct PlaybackSession {
    pub track_id: Option<TrackId>,
    pub state: PlaybackState,
    pub position: Duration,
    /// Media duration of the current track; zero when unknown.
    pub duration: Duration,
    pub speed: f32,
    pub generation: u64,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            track_id: None,
            state: PlaybackState::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            speed: 1.0,
            generation: 0,
        }
    }
}

pub type SessionHandle = Arc<Mutex<PlaybackSession>>;

/// Outcome of a background open, carried back to the audio thread.
pub type OpenResult = Result<Box<dyn MediaResource>, PlaybackError>;

pub enum AudioCmd {
    /// Replace the playlist and start the track at the given index.
    SetPlaylist { tracks: Vec<Track>, start_at: usize },
    Play,
    Pause,
    TogglePause,
    /// Release the resource and focus; the playlist stays.
    Stop,
    Next,
    Prev,
    SeekTo(Duration),
    Rewind(Duration),
    FastForward(Duration),
    SetSpeed(f32),
    /// Relative speed change, clamped to the supported range.
    NudgeSpeed(f32),
    SetSleep(SleepMode),
    /// Arm stop-at-end, or disarm it when it is already armed.
    ToggleStopAtEnd,
    Interrupted(Interruption),
    /// A background open finished for `generation`.
    Prepared { generation: u64, result: OpenResult },
    Tick(TimerKind),
    /// Quit the audio thread, optionally fading out over `fade_out_ms` milliseconds.
    Quit { fade_out_ms: u64 },
}

impl fmt::Debug for AudioCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetPlaylist { tracks, start_at } => f
                .debug_struct("SetPlaylist")
                .field("tracks", &tracks.len())
                .field("start_at", start_at)
                .finish(),
            Self::Play => f.write_str("Play"),
            Self::Pause => f.write_str("Pause"),
            Self::TogglePause => f.write_str("TogglePause"),
            Self::Stop => f.write_str("Stop"),
            Self::Next => f.write_str("Next"),
            Self::Prev => f.write_str("Prev"),
            Self::SeekTo(d) => f.debug_tuple("SeekTo").field(d).finish(),
            Self::Rewind(d) => f.debug_tuple("Rewind").field(d).finish(),
            Self::FastForward(d) => f.debug_tuple("FastForward").field(d).finish(),
            Self::SetSpeed(s) => f.debug_tuple("SetSpeed").field(s).finish(),
            Self::NudgeSpeed(s) => f.debug_tuple("NudgeSpeed").field(s).finish(),
            Self::SetSleep(m) => f.debug_tuple("SetSleep").field(m).finish(),
            Self::ToggleStopAtEnd => f.write_str("ToggleStopAtEnd"),
            Self::Interrupted(i) => f.debug_tuple("Interrupted").field(i).finish(),
            Self::Prepared { generation, result } => f
                .debug_struct("Prepared")
                .field("generation", generation)
                .field("ok", &result.is_ok())
                .finish(),
            Self::Tick(k) => f.debug_tuple("Tick").field(k).finish(),
            Self::Quit { fade_out_ms } => f
                .debug_struct("Quit")
                .field("fade_out_ms", fade_out_ms)
                .finish(),
        }
    }
}
