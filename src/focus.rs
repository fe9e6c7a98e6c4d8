//! Output focus: who may produce audio, and the events that take that right away.

mod device;

pub use device::{CpalProbe, DeviceFocusArbiter, InterruptFn, OutputProbe};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FocusLoss {
    /// Another client took the output for good.
    Permanent,
    /// Brief loss, e.g. a notification sound or a call.
    Transient,
    /// Output may continue at a lower volume.
    Duckable,
}

/// Why playback was interrupted from outside.
///
/// The controller pauses on every variant; the distinction is kept so callers
/// can report what happened.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interruption {
    FocusLost(FocusLoss),
    /// The output device was unplugged, disconnected or replaced.
    OutputRemoved,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FocusGrant {
    Granted,
    Denied,
}

pub trait FocusArbiter: Send {
    fn request(&mut self) -> FocusGrant;
    /// Give focus back and stop listening for interruptions.
    fn abandon(&mut self);
    fn holds_focus(&self) -> bool;
}

/// Always grants; never interrupts.
#[derive(Debug, Default)]
pub struct UnmanagedFocus {
    held: bool,
}

impl FocusArbiter for UnmanagedFocus {
    fn request(&mut self) -> FocusGrant {
        self.held = true;
        FocusGrant::Granted
    }

    fn abandon(&mut self) {
        self.held = false;
    }

    fn holds_focus(&self) -> bool {
        self.held
    }
}
