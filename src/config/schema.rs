use std::path::PathBuf;

use serde::Deserialize;

use crate::library::{SortKey, SortOrder};

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/xmvisio/config.toml` or `~/.config/xmvisio/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `XMVISIO__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub playback: PlaybackSettings,
    pub controls: ControlsSettings,
    pub library: LibrarySettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Fade-out duration when quitting (milliseconds).
    /// Set to 0 to stop immediately.
    pub quit_fade_out_ms: u64,
    /// Pause when the default output device disappears or changes.
    pub watch_output_device: bool,
    /// How often the output device is checked while playing (milliseconds).
    pub output_poll_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            quit_fade_out_ms: 500,
            watch_output_device: true,
            output_poll_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Resume tracks from their last saved position.
    pub resume_positions: bool,
    /// Interval between position saves while playing (milliseconds).
    pub autosave_interval_ms: u64,
    /// Interval between MPRIS refreshes while playing (milliseconds).
    pub notification_refresh_ms: u64,
    /// Speed multiplier applied to every newly prepared track.
    pub default_speed: f32,
    /// Whether "stop after this track" starts armed.
    pub stop_at_end: bool,
    /// Start playing the first track right after the library scan.
    pub autoplay: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            resume_positions: true,
            autosave_interval_ms: 1000,
            notification_refresh_ms: 1000,
            default_speed: 1.0,
            stop_at_end: false,
            autoplay: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Seconds skipped by rewind / fast-forward.
    pub skip_seconds: u64,
    /// Increment used by the speed up / down keys.
    pub speed_step: f32,
    /// Sleep timer presets cycled by the sleep key (minutes).
    pub sleep_presets_minutes: Vec<u64>,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            skip_seconds: 10,
            speed_step: 0.25,
            sleep_presets_minutes: vec![15, 30, 60],
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackDisplayField {
    /// "artist - title" when an artist is known, else the title.
    Display,
    Title,
    Artist,
    Album,
    Filename,
    Path,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,

    /// Which fields to use to build `Track.display`.
    ///
    /// Example: ["artist", "title"] -> "Artist - Title"
    pub display_fields: Vec<TrackDisplayField>,
    /// Separator used to join `display_fields`.
    pub display_separator: String,

    /// Category the scanned directory belongs to; sort order is remembered per category.
    pub category: String,
    /// Sort order used when nothing was remembered for the category yet.
    pub sort_key: SortKey,
    pub sort_descending: bool,
}

impl LibrarySettings {
    pub fn default_sort(&self) -> SortOrder {
        SortOrder {
            key: self.sort_key,
            descending: self.sort_descending,
        }
    }
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec![
                "mp3".into(),
                "flac".into(),
                "wav".into(),
                "ogg".into(),
                "m4a".into(),
                "m4b".into(),
                "opus".into(),
            ],
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
            display_fields: vec![TrackDisplayField::Artist, TrackDisplayField::Title],
            display_separator: " - ".to_string(),
            category: "music".to_string(),
            sort_key: SortKey::Display,
            sort_descending: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// State file holding positions and sort orders.
    /// Defaults to `$XDG_DATA_HOME/xmvisio/state.toml`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `XMVISIO_LOG` is unset.
    pub level: String,
    /// Log file. Defaults to `$XDG_STATE_HOME/xmvisio/xmvisio.log`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "xmvisio=info".to_string(),
            file: None,
        }
    }
}
