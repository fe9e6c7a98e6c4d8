use std::io::{self, Write};
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};
use tracing::{info, warn};

use crate::audio::{AudioCmd, AudioPlayer, PlaybackSession, PlaybackState};
use crate::config;
use crate::library::{self, SortOrder, Track};
use crate::mpris::ControlCmd;
use crate::playlist::SleepMode;
use crate::store::KvStore;

/// What an input asks the runtime to do.
#[derive(Debug)]
pub enum Action {
    Send(AudioCmd),
    /// Resume, or start the playlist from the top when nothing is loaded.
    PlayOrStart,
    /// Toggle, or start the playlist from the top when nothing is loaded.
    ToggleOrStart,
    /// Move the library to the next sort key and remember it.
    CycleSort,
    Quit,
}

/// The scanned library as the input loop sees it.
pub struct Library<'a> {
    pub tracks: &'a mut Vec<Track>,
    pub order: &'a mut SortOrder,
    pub kv: &'a dyn KvStore,
}

impl Library<'_> {
    /// Re-sort by the next key. The loaded playlist keeps its order until it is restarted.
    fn cycle_sort(&mut self, category: &str) {
        self.order.key = self.order.key.next();
        self.order.apply(self.tracks);
        if let Err(e) = library::save_sort_order(self.kv, category, *self.order) {
            warn!(error = %e, "sort order not saved");
        }
        info!(order = %self.order, "library re-sorted");
    }
}

/// Sleep timer presets cycled with one key.
pub struct SleepCycle {
    presets: Vec<Duration>,
    /// 0 is off, `n` is `presets[n - 1]`.
    pos: usize,
}

impl SleepCycle {
    pub fn new(settings: &config::ControlsSettings) -> Self {
        Self {
            presets: settings
                .sleep_presets_minutes
                .iter()
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .collect(),
            pos: 0,
        }
    }

    fn next_preset(&mut self) -> SleepMode {
        self.pos = (self.pos + 1) % (self.presets.len() + 1);
        match self.pos {
            0 => SleepMode::Off,
            n => SleepMode::After(self.presets[n - 1]),
        }
    }

    /// Stop-at-end shares the sleep slot, so the preset cycle starts over.
    fn toggle_end_of_track(&mut self) -> AudioCmd {
        self.pos = 0;
        AudioCmd::ToggleStopAtEnd
    }
}

pub fn map_key(key: &KeyEvent, settings: &config::Settings, sleep: &mut SleepCycle) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }
    let skip = Duration::from_secs(settings.controls.skip_seconds);
    let step = settings.controls.speed_step;

    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char(' ') | KeyCode::Char('p') => Action::ToggleOrStart,
        KeyCode::Enter => Action::PlayOrStart,
        KeyCode::Char('l') | KeyCode::Char('n') => Action::Send(AudioCmd::Next),
        KeyCode::Char('h') | KeyCode::Char('b') => Action::Send(AudioCmd::Prev),
        KeyCode::Char('L') | KeyCode::Right => Action::Send(AudioCmd::FastForward(skip)),
        KeyCode::Char('H') | KeyCode::Left => Action::Send(AudioCmd::Rewind(skip)),
        KeyCode::Char('+') | KeyCode::Char('=') => Action::Send(AudioCmd::NudgeSpeed(step)),
        KeyCode::Char('-') => Action::Send(AudioCmd::NudgeSpeed(-step)),
        KeyCode::Char('0') => Action::Send(AudioCmd::SetSpeed(1.0)),
        KeyCode::Char('s') => Action::Send(AudioCmd::SetSleep(sleep.next_preset())),
        KeyCode::Char('e') => Action::Send(sleep.toggle_end_of_track()),
        KeyCode::Char('x') => Action::Send(AudioCmd::Stop),
        KeyCode::Char('o') => Action::CycleSort,
        _ => return None,
    };
    Some(action)
}

pub fn map_control(cmd: ControlCmd) -> Action {
    match cmd {
        ControlCmd::Quit => Action::Quit,
        ControlCmd::Play => Action::PlayOrStart,
        ControlCmd::Pause => Action::Send(AudioCmd::Pause),
        ControlCmd::PlayPause => Action::ToggleOrStart,
        ControlCmd::Stop => Action::Send(AudioCmd::Stop),
        ControlCmd::Next => Action::Send(AudioCmd::Next),
        ControlCmd::Prev => Action::Send(AudioCmd::Prev),
        ControlCmd::Seek(micros) => {
            let by = Duration::from_micros(micros.unsigned_abs());
            if micros < 0 {
                Action::Send(AudioCmd::Rewind(by))
            } else {
                Action::Send(AudioCmd::FastForward(by))
            }
        }
        ControlCmd::SetPosition(at) => Action::Send(AudioCmd::SeekTo(at)),
        // MPRIS treats a zero rate as a pause request.
        ControlCmd::SetRate(rate) if rate == 0.0 => Action::Send(AudioCmd::Pause),
        ControlCmd::SetRate(rate) => Action::Send(AudioCmd::SetSpeed(rate as f32)),
    }
}

/// Apply `action`. Returns true when the runtime should shut down.
fn perform(action: Action, settings: &config::Settings, library: &mut Library<'_>, player: &AudioPlayer) -> bool {
    let nothing_loaded = player
        .session_handle()
        .lock()
        .map(|s| s.track_id.is_none())
        .unwrap_or(true);
    if let Action::CycleSort = action {
        library.cycle_sort(&settings.library.category);
        return false;
    }
    let tracks: &[Track] = library.tracks;
    let start = || AudioCmd::SetPlaylist {
        tracks: tracks.to_vec(),
        start_at: 0,
    };

    let cmd = match action {
        Action::Quit => {
            player.quit_softly(Duration::from_millis(settings.audio.quit_fade_out_ms));
            return true;
        }
        Action::CycleSort => return false,
        Action::PlayOrStart if nothing_loaded && !tracks.is_empty() => start(),
        Action::ToggleOrStart if nothing_loaded && !tracks.is_empty() => start(),
        Action::PlayOrStart => AudioCmd::Play,
        Action::ToggleOrStart => AudioCmd::TogglePause,
        Action::Send(cmd) => cmd,
    };
    let _ = player.send(cmd);
    false
}

fn clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn status_line(session: &PlaybackSession, tracks: &[Track]) -> String {
    let title = session
        .track_id
        .and_then(|id| tracks.iter().find(|t| t.id == id))
        .map(|t| t.display.as_str())
        .unwrap_or("-");
    let state = match session.state {
        PlaybackState::Idle => "stopped",
        PlaybackState::Preparing => "loading",
        PlaybackState::Ready | PlaybackState::Paused => "paused",
        PlaybackState::Playing => "playing",
        PlaybackState::Completed => "finished",
    };
    format!(
        "[{state}] {title}  {} / {}  {:.2}x",
        clock(session.position),
        clock(session.duration),
        session.speed
    )
}

fn draw(out: &mut impl Write, line: &str) -> io::Result<()> {
    queue!(
        out,
        cursor::MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        Print(line)
    )?;
    out.flush()
}

/// Terminal input loop. Returns when a quit is requested from the keyboard or MPRIS.
pub fn run(
    settings: &config::Settings,
    library: &mut Library<'_>,
    player: &AudioPlayer,
    control_rx: &mpsc::Receiver<ControlCmd>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sleep = SleepCycle::new(&settings.controls);
    let mut stdout = io::stdout();
    let mut last_line = String::new();

    loop {
        let line = player
            .session_handle()
            .lock()
            .map(|s| status_line(&s, library.tracks))
            .unwrap_or_default();
        if line != last_line {
            draw(&mut stdout, &line)?;
            last_line = line;
        }

        while let Ok(cmd) = control_rx.try_recv() {
            if perform(map_control(cmd), settings, library, player) {
                return Ok(());
            }
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(action) = map_key(&key, settings, &mut sleep) {
                    if perform(action, settings, library, player) {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn transport_keys_map_to_commands() {
        let settings = config::Settings::default();
        let mut sleep = SleepCycle::new(&settings.controls);

        assert!(matches!(map_key(&key('l'), &settings, &mut sleep), Some(Action::Send(AudioCmd::Next))));
        assert!(matches!(map_key(&key('h'), &settings, &mut sleep), Some(Action::Send(AudioCmd::Prev))));
        assert!(matches!(map_key(&key(' '), &settings, &mut sleep), Some(Action::ToggleOrStart)));
        assert!(matches!(
            map_key(&key('L'), &settings, &mut sleep),
            Some(Action::Send(AudioCmd::FastForward(d))) if d == Duration::from_secs(10)
        ));
        assert!(matches!(
            map_key(&key('-'), &settings, &mut sleep),
            Some(Action::Send(AudioCmd::NudgeSpeed(s))) if s == -0.25
        ));
        assert!(matches!(map_key(&key('q'), &settings, &mut sleep), Some(Action::Quit)));
        assert!(map_key(&key('z'), &settings, &mut sleep).is_none());

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(map_key(&ctrl_c, &settings, &mut sleep), Some(Action::Quit)));
    }

    #[test]
    fn sort_key_cycles_and_persists() {
        use crate::library::{SortKey, load_sort_order};
        use crate::store::MemoryStore;

        let settings = config::Settings::default();
        let mut sleep = SleepCycle::new(&settings.controls);
        assert!(matches!(map_key(&key('o'), &settings, &mut sleep), Some(Action::CycleSort)));

        let kv = MemoryStore::default();
        let mut tracks = Vec::new();
        let mut order = SortOrder {
            key: SortKey::Duration,
            descending: false,
        };
        let mut library = Library {
            tracks: &mut tracks,
            order: &mut order,
            kv: &kv,
        };
        library.cycle_sort("music");
        assert_eq!(library.order.key, SortKey::Display);
        assert_eq!(load_sort_order(&kv, "music").unwrap(), Some(*library.order));
    }

    #[test]
    fn sleep_key_cycles_presets_then_off() {
        let settings = config::Settings::default();
        let mut sleep = SleepCycle::new(&settings.controls);

        let mut modes = Vec::new();
        for _ in 0..4 {
            if let Some(Action::Send(AudioCmd::SetSleep(m))) = map_key(&key('s'), &settings, &mut sleep) {
                modes.push(m);
            }
        }
        assert_eq!(
            modes,
            vec![
                SleepMode::After(Duration::from_secs(15 * 60)),
                SleepMode::After(Duration::from_secs(30 * 60)),
                SleepMode::After(Duration::from_secs(60 * 60)),
                SleepMode::Off,
            ]
        );
    }

    #[test]
    fn end_of_track_key_defers_to_the_player() {
        let settings = config::Settings::default();
        let mut sleep = SleepCycle::new(&settings.controls);

        map_key(&key('s'), &settings, &mut sleep);
        for _ in 0..2 {
            assert!(matches!(
                map_key(&key('e'), &settings, &mut sleep),
                Some(Action::Send(AudioCmd::ToggleStopAtEnd))
            ));
        }
        // The preset cycle restarts after stop-at-end took the slot.
        assert!(matches!(
            map_key(&key('s'), &settings, &mut sleep),
            Some(Action::Send(AudioCmd::SetSleep(SleepMode::After(d)))) if d == Duration::from_secs(15 * 60)
        ));
    }

    #[test]
    fn mpris_seek_direction_follows_sign() {
        assert!(matches!(
            map_control(ControlCmd::Seek(-5_000_000)),
            Action::Send(AudioCmd::Rewind(d)) if d == Duration::from_secs(5)
        ));
        assert!(matches!(
            map_control(ControlCmd::Seek(2_000_000)),
            Action::Send(AudioCmd::FastForward(d)) if d == Duration::from_secs(2)
        ));
        assert!(matches!(map_control(ControlCmd::PlayPause), Action::ToggleOrStart));
    }

    #[test]
    fn mpris_zero_rate_pauses() {
        assert!(matches!(map_control(ControlCmd::SetRate(0.0)), Action::Send(AudioCmd::Pause)));
        assert!(matches!(
            map_control(ControlCmd::SetRate(1.5)),
            Action::Send(AudioCmd::SetSpeed(s)) if s == 1.5
        ));
    }

    #[test]
    fn status_line_shows_title_time_and_speed() {
        let session = PlaybackSession {
            track_id: None,
            state: PlaybackState::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            speed: 1.0,
            generation: 0,
        };
        assert_eq!(status_line(&session, &[]), "[stopped] -  00:00 / 00:00  1.00x");

        let session = PlaybackSession {
            position: Duration::from_secs(83),
            duration: Duration::from_secs(296),
            state: PlaybackState::Playing,
            speed: 1.25,
            ..session
        };
        assert_eq!(status_line(&session, &[]), "[playing] -  01:23 / 04:56  1.25x");
    }
}
