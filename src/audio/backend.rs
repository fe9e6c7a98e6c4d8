//! Seams between the engine and whatever actually decodes and renders audio.

use std::time::Duration;

use crate::error::PlaybackError;
use crate::library::Track;

/// One opened, decodable media resource. Dropping it releases it.
pub trait MediaResource: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, offset: Duration) -> Result<(), PlaybackError>;
    fn set_speed(&mut self, speed: f32);
    fn set_volume(&mut self, volume: f32);
    /// True once every sample has been rendered.
    fn is_finished(&self) -> bool;
}

/// Opens resources for tracks. Implementations must be callable from worker threads.
pub trait MediaBackend: Send + Sync {
    /// Open `track` paused at its start.
    fn open(&self, track: &Track) -> Result<Box<dyn MediaResource>, PlaybackError>;
}
