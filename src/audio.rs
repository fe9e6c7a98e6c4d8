//! Audio playback: the engine, its clock, the rodio backend and the player thread.

mod backend;
mod clock;
mod engine;
mod player;
mod sink;
mod thread;
mod types;

pub use backend::{MediaBackend, MediaResource};
pub use clock::PlaybackClock;
pub use engine::{
    Completion, ErrorCallback, PlaybackEngine, PrepareMode, PrepareOutcome, PrepareRequest,
};
pub use player::AudioPlayer;
pub use sink::RodioBackend;
pub use types::{
    AudioCmd, MAX_SPEED, MIN_SPEED, OpenResult, PlaybackSession, PlaybackState, SessionHandle,
    speed_in_range,
};

#[cfg(test)]
pub(crate) mod fake;
