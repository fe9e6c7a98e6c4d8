use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::audio::{AudioCmd, AudioPlayer};
use crate::config;
use crate::focus::{CpalProbe, DeviceFocusArbiter, FocusArbiter, InterruptFn, UnmanagedFocus};
use crate::library::{self, SortOrder, Track};
use crate::playlist::SleepMode;
use crate::store::{KvStore, MemoryStore, TomlFileStore};

/// Open the durable store, falling back to memory for this session when it is unusable.
pub fn open_store(settings: &config::StoreSettings) -> Arc<dyn KvStore> {
    let Some(path) = settings.path.clone().or_else(config::default_state_path) else {
        error!("no state directory; positions will not survive this session");
        return Arc::new(MemoryStore::default());
    };
    match TomlFileStore::open(&path) {
        Ok(store) => {
            info!(path = %path.display(), "state store opened");
            Arc::new(store)
        }
        Err(e) => {
            error!(error = %e, "store unavailable; positions will not survive this session");
            Arc::new(MemoryStore::default())
        }
    }
}

/// Scan `dir` and order the tracks by the category's saved sort order.
pub fn load_library(
    dir: &Path,
    settings: &config::LibrarySettings,
    kv: &dyn KvStore,
) -> (Vec<Track>, SortOrder) {
    let mut tracks = library::scan(dir, settings);
    let order = match library::load_sort_order(kv, &settings.category) {
        Ok(Some(order)) => order,
        Ok(None) => settings.default_sort(),
        Err(e) => {
            warn!(error = %e, "sort order not restored");
            settings.default_sort()
        }
    };
    order.apply(&mut tracks);
    info!(count = tracks.len(), %order, category = %settings.category, "library loaded");
    (tracks, order)
}

pub fn focus_arbiter(settings: &config::AudioSettings, audio_tx: Sender<AudioCmd>) -> Box<dyn FocusArbiter> {
    if !settings.watch_output_device {
        return Box::new(UnmanagedFocus::default());
    }
    let notify: InterruptFn = Arc::new(move |i| {
        let _ = audio_tx.send(AudioCmd::Interrupted(i));
    });
    Box::new(DeviceFocusArbiter::new(
        Arc::new(CpalProbe),
        Duration::from_millis(settings.output_poll_ms),
        notify,
    ))
}

/// Arm the configured defaults and, with autoplay, start from the top.
pub fn apply_playback_defaults(player: &AudioPlayer, settings: &config::Settings, tracks: &[Track]) {
    if settings.playback.stop_at_end {
        let _ = player.send(AudioCmd::SetSleep(SleepMode::EndOfTrack));
    }
    if settings.playback.autoplay && !tracks.is_empty() {
        let _ = player.send(AudioCmd::SetPlaylist {
            tracks: tracks.to_vec(),
            start_at: 0,
        });
    }
}
