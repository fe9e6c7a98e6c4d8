//! Error types shared by the playback core.
//!
//! Engine and controller operations return [`Result`]; persistence returns
//! [`StoreError`] so callers can tell a missing offset from a broken store.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a [`PlaybackError`], stable enough to match on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource could not be opened (missing file, permissions).
    NotFound,
    /// The resource opened but could not be decoded.
    Unsupported,
    /// The output device refused the stream.
    Output,
    /// The requested operation does not fit the current state.
    InvalidState,
    /// An argument was out of range.
    InvalidArgument,
    /// Audio focus was not granted.
    FocusDenied,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("audio output error: {0}")]
    Output(String),

    #[error("seek to {0:?} failed")]
    Seek(Duration),

    #[error("speed {0} is outside the supported range")]
    InvalidSpeed(f32),

    #[error("no track loaded")]
    NoTrackLoaded,

    #[error("audio focus denied")]
    FocusDenied,

    #[error("playlist is empty")]
    EmptyPlaylist,

    #[error("index {index} out of bounds for playlist of {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl PlaybackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } => ErrorKind::NotFound,
            Self::Decode { .. } => ErrorKind::Unsupported,
            Self::Output(_) => ErrorKind::Output,
            Self::Seek(_) | Self::NoTrackLoaded => ErrorKind::InvalidState,
            Self::InvalidSpeed(_) | Self::EmptyPlaylist | Self::IndexOutOfBounds { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::FocusDenied => ErrorKind::FocusDenied,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file cannot be read or written at all.
    #[error("store at {path:?} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store at {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode store contents: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("value {value:?} at {namespace}/{key} is malformed")]
    Malformed {
        namespace: String,
        key: String,
        value: String,
    },

    #[error("position writer has shut down")]
    WriterGone,
}
