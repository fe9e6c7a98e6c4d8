//! System transport surface: the MPRIS D-Bus service that mirrors what is
//! playing and forwards media keys / desktop widgets back as [`ControlCmd`]s.

use std::collections::HashMap;
use std::sync::mpsc::{self, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, warn};
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::audio::{MAX_SPEED, MIN_SPEED};
use crate::library::Track;

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.xmvisio";

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative seek in microseconds, as MPRIS sends it.
    Seek(i64),
    SetPosition(Duration),
    SetRate(f64),
}

/// Everything the notification shows; a pure projection of controller state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub track: Option<Track>,
    pub playing: bool,
    pub has_prev: bool,
    pub has_next: bool,
    /// Extra line, e.g. the sleep timer countdown.
    pub aux_text: Option<String>,
    pub position: Duration,
    pub speed: f32,
}

pub trait NotificationPresenter: Send {
    /// Replace whatever is shown with `now`.
    fn update(&self, now: &NowPlaying);
    /// Withdraw the notification.
    fn clear(&self);
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum Status {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug)]
struct SharedState {
    status: Status,
    track_id: Option<OwnedObjectPath>,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    comment: Option<String>,
    position_micros: i64,
    rate: f64,
    can_prev: bool,
    can_next: bool,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            status: Status::Stopped,
            track_id: None,
            title: None,
            artist: Vec::new(),
            album: None,
            url: None,
            length_micros: None,
            comment: None,
            position_micros: 0,
            rate: 1.0,
            can_prev: false,
            can_next: false,
        }
    }
}

fn micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

impl SharedState {
    fn apply(&mut self, now: &NowPlaying) {
        let track = now.track.as_ref();
        self.status = match (track, now.playing) {
            (None, _) => Status::Stopped,
            (Some(_), true) => Status::Playing,
            (Some(_), false) => Status::Paused,
        };
        self.track_id = track.and_then(|t| {
            OwnedObjectPath::try_from(format!("{OBJECT_PATH}/track/{}", t.id)).ok()
        });
        self.title = track.map(|t| t.title.clone());
        self.artist = track.and_then(|t| t.artist.clone()).into_iter().collect();
        self.album = track.and_then(|t| t.album.clone());
        self.url = track.map(|t| format!("file://{}", t.path.display()));
        self.length_micros = track.and_then(|t| t.duration).map(micros);
        self.comment = now.aux_text.clone();
        self.position_micros = micros(now.position);
        self.rate = f64::from(now.speed);
        self.can_prev = now.has_prev;
        self.can_next = now.has_next;
    }
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<()>,
}

impl NotificationPresenter for MprisHandle {
    fn update(&self, now: &NowPlaying) {
        if let Ok(mut s) = self.state.lock() {
            s.apply(now);
        }
        let _ = self.notify.send(());
    }

    fn clear(&self) {
        if let Ok(mut s) = self.state.lock() {
            *s = SharedState::default();
        }
        let _ = self.notify.send(());
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // Terminal host; nothing to raise.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "xmvisio"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

impl PlayerIface {
    fn read<T>(&self, f: impl FnOnce(&SharedState) -> T) -> Option<T> {
        self.state.lock().ok().map(|s| f(&s))
    }
}

fn insert<'a>(map: &mut HashMap<String, OwnedValue>, key: &str, value: impl Into<Value<'a>>) {
    if let Ok(v) = OwnedValue::try_from(value.into()) {
        map.insert(key.to_string(), v);
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::Seek(offset));
    }

    fn set_position(&self, track_id: OwnedObjectPath, position: i64) {
        // Stale requests for a track that is no longer current must be ignored.
        let current = self.read(|s| s.track_id.clone()).flatten();
        if current.as_ref() != Some(&track_id) || position < 0 {
            return;
        }
        let position = Duration::from_micros(position.unsigned_abs());
        let _ = self.tx.send(ControlCmd::SetPosition(position));
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        match self.read(|s| s.status).unwrap_or_default() {
            Status::Stopped => "Stopped",
            Status::Playing => "Playing",
            Status::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        self.read(|s| s.rate).unwrap_or(1.0)
    }

    #[zbus(property)]
    fn set_rate(&self, rate: f64) {
        let _ = self.tx.send(ControlCmd::SetRate(rate));
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        f64::from(MIN_SPEED)
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        f64::from(MAX_SPEED)
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.read(|s| s.position_micros).unwrap_or(0)
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        self.read(|s| s.can_next).unwrap_or(false)
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        self.read(|s| s.can_prev).unwrap_or(false)
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let track_id = s
            .track_id
            .as_deref()
            .cloned()
            .unwrap_or_else(|| ObjectPath::from_static_str_unchecked("/org/mpris/MediaPlayer2/TrackList/NoTrack"));
        insert(&mut map, "mpris:trackid", track_id);
        insert(&mut map, "xesam:title", s.title.clone().unwrap_or_default());
        if !s.artist.is_empty() {
            insert(&mut map, "xesam:artist", s.artist.clone());
        }
        if let Some(album) = &s.album {
            insert(&mut map, "xesam:album", album.clone());
        }
        if let Some(url) = &s.url {
            insert(&mut map, "xesam:url", url.clone());
        }
        if let Some(len) = s.length_micros {
            insert(&mut map, "mpris:length", len);
        }
        if let Some(comment) = &s.comment {
            insert(&mut map, "xesam:comment", vec![comment.clone()]);
        }
        map
    }
}

/// Register the MPRIS service on the session bus from a background thread.
///
/// The returned handle keeps working (as a no-op mirror) when no bus is available.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<()>();

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("mpris".to_string())
        .spawn(move || {
            block_on(async move {
                let connection = match Connection::session().await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "MPRIS: failed to connect to session bus");
                        return;
                    }
                };

                if let Err(e) = connection.request_name(BUS_NAME).await {
                    warn!(error = %e, "MPRIS: failed to acquire name");
                    return;
                }

                let object_server = connection.object_server();

                if let Err(e) = object_server
                    .at(OBJECT_PATH, RootIface { tx: tx.clone() })
                    .await
                {
                    warn!(error = %e, "MPRIS: failed to register root iface");
                    return;
                }

                if let Err(e) = object_server
                    .at(
                        OBJECT_PATH,
                        PlayerIface {
                            tx,
                            state: state_for_thread,
                        },
                    )
                    .await
                {
                    warn!(error = %e, "MPRIS: failed to register player iface");
                    return;
                }

                let player = match object_server
                    .interface::<_, PlayerIface>(OBJECT_PATH)
                    .await
                {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "MPRIS: player iface vanished");
                        return;
                    }
                };
                debug!("MPRIS service registered");

                loop {
                    Timer::after(Duration::from_millis(100)).await;

                    let mut changed = false;
                    loop {
                        match notify_rx.try_recv() {
                            Ok(()) => changed = true,
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => return,
                        }
                    }
                    if !changed {
                        continue;
                    }

                    let iface = player.get().await;
                    let emitter = player.signal_emitter();
                    let results = [
                        iface.playback_status_changed(emitter).await,
                        iface.metadata_changed(emitter).await,
                        iface.can_go_next_changed(emitter).await,
                        iface.can_go_previous_changed(emitter).await,
                        iface.rate_changed(emitter).await,
                    ];
                    if let Some(Err(e)) = results.into_iter().find(Result::is_err) {
                        debug!(error = %e, "MPRIS: failed to signal property change");
                    }
                }
            });
        });
    if let Err(e) = spawned {
        warn!(error = %e, "MPRIS: failed to spawn service thread");
    }

    MprisHandle {
        state,
        notify: notify_tx,
    }
}

#[cfg(test)]
mod tests;
