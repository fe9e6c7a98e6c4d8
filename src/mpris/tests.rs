use super::*;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use crate::library::TrackId;

fn make_track() -> Track {
    let path = PathBuf::from("/tmp/music/test.mp3");
    Track {
        id: TrackId::from_path(&path),
        path,
        title: "Test Title".to_string(),
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        duration: Some(Duration::from_micros(1_234_567)),
        date_added: None,
        display: "Test Artist - Test Title".to_string(),
    }
}

fn handle() -> (MprisHandle, Arc<Mutex<SharedState>>, mpsc::Receiver<()>) {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<()>();
    (
        MprisHandle {
            state: state.clone(),
            notify: notify_tx,
        },
        state,
        notify_rx,
    )
}

fn player(state: Arc<Mutex<SharedState>>) -> (PlayerIface, mpsc::Receiver<ControlCmd>) {
    let (tx, rx) = mpsc::channel::<ControlCmd>();
    (PlayerIface { tx, state }, rx)
}

#[test]
fn update_mirrors_now_playing_and_clear_resets() {
    let (handle, state, notify) = handle();
    let track = make_track();

    handle.update(&NowPlaying {
        track: Some(track.clone()),
        playing: true,
        has_prev: false,
        has_next: true,
        aux_text: Some("Sleep in 14:59".to_string()),
        position: Duration::from_secs(3),
        speed: 1.5,
    });
    assert!(notify.try_recv().is_ok());

    {
        let s = state.lock().unwrap();
        assert_eq!(s.status, Status::Playing);
        assert_eq!(s.title.as_deref(), Some("Test Title"));
        assert_eq!(s.artist, vec!["Test Artist".to_string()]);
        assert_eq!(s.album.as_deref(), Some("Test Album"));
        assert!(s.url.as_deref().unwrap().contains("/tmp/music/test.mp3"));
        assert_eq!(s.length_micros, Some(1_234_567));
        assert_eq!(s.comment.as_deref(), Some("Sleep in 14:59"));
        assert_eq!(s.position_micros, 3_000_000);
        assert_eq!(s.rate, 1.5);
        assert!(s.can_next);
        assert!(!s.can_prev);
        assert_eq!(
            s.track_id.as_ref().map(|p| p.as_str().to_string()),
            Some(format!("/org/mpris/MediaPlayer2/track/{}", track.id))
        );
    }

    handle.clear();
    assert!(notify.try_recv().is_ok());
    let s = state.lock().unwrap();
    assert_eq!(s.status, Status::Stopped);
    assert_eq!(s.title, None);
    assert!(s.artist.is_empty());
    assert!(s.track_id.is_none());
    assert!(!s.can_next);
}

#[test]
fn playback_status_follows_track_and_playing_flag() {
    let (handle, state, _notify) = handle();
    let (iface, _rx) = player(state);

    assert_eq!(iface.playback_status(), "Stopped");

    let mut now = NowPlaying {
        track: Some(make_track()),
        playing: true,
        speed: 1.0,
        ..NowPlaying::default()
    };
    handle.update(&now);
    assert_eq!(iface.playback_status(), "Playing");

    now.playing = false;
    handle.update(&now);
    assert_eq!(iface.playback_status(), "Paused");

    now.track = None;
    handle.update(&now);
    assert_eq!(iface.playback_status(), "Stopped");
}

#[test]
fn metadata_includes_expected_keys_when_present() {
    let (handle, state, _notify) = handle();
    let (iface, _rx) = player(state);

    handle.update(&NowPlaying {
        track: Some(make_track()),
        aux_text: Some("Stopping after this track".to_string()),
        speed: 1.0,
        ..NowPlaying::default()
    });

    let map = iface.metadata();
    for k in [
        "mpris:trackid",
        "xesam:title",
        "xesam:artist",
        "xesam:album",
        "xesam:url",
        "mpris:length",
        "xesam:comment",
    ] {
        assert!(map.contains_key(k), "missing key: {k}");
    }
}

#[test]
fn metadata_without_a_track_reports_no_track() {
    let (_handle, state, _notify) = handle();
    let (iface, _rx) = player(state);

    let map = iface.metadata();
    assert!(map.contains_key("mpris:trackid"));
    assert!(!map.contains_key("mpris:length"));
    assert!(!map.contains_key("xesam:comment"));
}

#[test]
fn transport_methods_forward_control_commands() {
    let (_handle, state, _notify) = handle();
    let (iface, rx) = player(state);

    iface.play_pause();
    iface.next();
    iface.previous();
    iface.seek(-5_000_000);
    iface.set_rate(2.0);
    iface.stop();

    let got: Vec<ControlCmd> = rx.try_iter().collect();
    assert_eq!(
        got,
        vec![
            ControlCmd::PlayPause,
            ControlCmd::Next,
            ControlCmd::Prev,
            ControlCmd::Seek(-5_000_000),
            ControlCmd::SetRate(2.0),
            ControlCmd::Stop,
        ]
    );
}

#[test]
fn set_position_ignores_a_stale_track_id() {
    let (handle, state, _notify) = handle();
    let (iface, rx) = player(state.clone());
    let track = make_track();
    handle.update(&NowPlaying {
        track: Some(track),
        speed: 1.0,
        ..NowPlaying::default()
    });

    let current = state.lock().unwrap().track_id.clone().unwrap();
    let stale = OwnedObjectPath::try_from("/org/mpris/MediaPlayer2/track/0").unwrap();

    iface.set_position(stale, 1_000_000);
    assert!(rx.try_recv().is_err());

    iface.set_position(current, 2_000_000);
    assert_eq!(
        rx.try_recv().unwrap(),
        ControlCmd::SetPosition(Duration::from_secs(2))
    );
}

#[test]
fn can_go_next_and_previous_follow_playlist_bounds() {
    let (handle, state, _notify) = handle();
    let (iface, _rx) = player(state);

    handle.update(&NowPlaying {
        track: Some(make_track()),
        has_prev: true,
        has_next: false,
        speed: 1.0,
        ..NowPlaying::default()
    });
    assert!(iface.can_go_previous());
    assert!(!iface.can_go_next());
}
