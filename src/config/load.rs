use std::{env, path::PathBuf};

use super::schema::Settings;

const MIN_INTERVAL_MS: u64 = 100;
/// Positions must be written at least once per second while playing.
const MAX_AUTOSAVE_MS: u64 = 1000;
const MAX_SLEEP_MINUTES: u64 = 24 * 60;

/// Configuration loading helpers.
///
/// `Settings::load` reads an optional config file, then environment variables
/// (prefix `XMVISIO__`) on top, and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("XMVISIO")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.playback.autosave_interval_ms < MIN_INTERVAL_MS {
            return Err(format!(
                "playback.autosave_interval_ms must be >= {MIN_INTERVAL_MS}"
            ));
        }
        if self.playback.autosave_interval_ms > MAX_AUTOSAVE_MS {
            return Err(format!(
                "playback.autosave_interval_ms must be <= {MAX_AUTOSAVE_MS}"
            ));
        }
        if self.playback.notification_refresh_ms < MIN_INTERVAL_MS {
            return Err(format!(
                "playback.notification_refresh_ms must be >= {MIN_INTERVAL_MS}"
            ));
        }
        if self.audio.watch_output_device && self.audio.output_poll_ms < MIN_INTERVAL_MS {
            return Err(format!("audio.output_poll_ms must be >= {MIN_INTERVAL_MS}"));
        }
        if !crate::audio::speed_in_range(self.playback.default_speed) {
            return Err("playback.default_speed must be within 0.25..=4.0".to_string());
        }
        if !(self.controls.speed_step.is_finite() && self.controls.speed_step > 0.0) {
            return Err("controls.speed_step must be > 0".to_string());
        }
        if let Some(m) = self
            .controls
            .sleep_presets_minutes
            .iter()
            .find(|&&m| m == 0 || m > MAX_SLEEP_MINUTES)
        {
            return Err(format!(
                "controls.sleep_presets_minutes must be within 1..={MAX_SLEEP_MINUTES} (got {m})"
            ));
        }
        Ok(())
    }
}

/// Resolve the config path from `XMVISIO_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("XMVISIO_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/xmvisio/config.toml`
/// or `~/.config/xmvisio/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config").map(|d| d.join("xmvisio").join("config.toml"))
}

/// `$XDG_DATA_HOME/xmvisio/state.toml`, or `~/.local/share/xmvisio/state.toml`.
pub fn default_state_path() -> Option<PathBuf> {
    xdg_dir("XDG_DATA_HOME", ".local/share").map(|d| d.join("xmvisio").join("state.toml"))
}

/// `$XDG_STATE_HOME/xmvisio/xmvisio.log`, or `~/.local/state/xmvisio/xmvisio.log`.
pub fn default_log_path() -> Option<PathBuf> {
    xdg_dir("XDG_STATE_HOME", ".local/state").map(|d| d.join("xmvisio").join("xmvisio.log"))
}

fn xdg_dir(var: &str, home_fallback: &str) -> Option<PathBuf> {
    if let Some(xdg) = env::var_os(var) {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(home_fallback))
    }
}
