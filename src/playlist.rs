//! Playlist navigation, completion handling and the timers that run while playing.

mod controller;
mod model;
mod sleep;
mod timers;

pub use controller::{ControllerSettings, PlaylistController};
pub use model::Playlist;
pub use sleep::{SleepMode, SleepTimer};
pub use timers::{TickFn, TimerKind, TimerScope};
