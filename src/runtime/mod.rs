use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use rodio::OutputStreamBuilder;
use tracing::{error, info, warn};

use crate::audio::{AudioCmd, AudioPlayer, PlaybackEngine, PrepareMode, RodioBackend};
use crate::mpris::{ControlCmd, spawn_mpris};
use crate::playlist::{ControllerSettings, PlaylistController, TickFn};
use crate::store::PositionStore;

mod event_loop;
mod logging;
mod settings;
mod startup;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, settings_warning) = settings::load_settings();
    match logging::init(&settings.logging) {
        Ok(path) => info!(log = %path.display(), "xmvisio starting"),
        Err(e) => eprintln!("xmvisio: logging disabled: {e}"),
    }
    if let Some(msg) = settings_warning {
        warn!("{msg}");
    }

    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let kv = startup::open_store(&settings.store);
    let (mut tracks, mut order) = startup::load_library(&dir, &settings.library, kv.as_ref());

    // The stream must outlive the player thread; it is dropped last.
    let mut stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
        error!(error = %e, "no audio output device");
        e
    })?;
    // rodio logs to stderr when OutputStream is dropped, which garbles the terminal.
    stream.log_on_drop(false);

    let (audio_tx, audio_rx) = AudioPlayer::channel();
    let mut engine = PlaybackEngine::new(
        Arc::new(RodioBackend::new(stream.mixer().clone())),
        Arc::new(PositionStore::new(kv.clone())),
        PrepareMode::Background(audio_tx.clone()),
    )
    .with_resume_positions(settings.playback.resume_positions)
    .with_speed(settings.playback.default_speed);
    engine.set_error_callback(Box::new(|e| {
        error!(error = %e, kind = ?e.kind(), "playback failed");
    }));

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = spawn_mpris(control_tx);

    let tick_tx = audio_tx.clone();
    let tick: TickFn = Arc::new(move |kind| {
        let _ = tick_tx.send(AudioCmd::Tick(kind));
    });

    let controller = PlaylistController::new(
        engine,
        startup::focus_arbiter(&settings.audio, audio_tx.clone()),
        Box::new(mpris),
        tick,
        ControllerSettings {
            autosave_interval: Duration::from_millis(settings.playback.autosave_interval_ms),
            refresh_interval: Duration::from_millis(settings.playback.notification_refresh_ms),
        },
    );
    let player = AudioPlayer::spawn(controller, audio_tx, audio_rx)?;

    startup::apply_playback_defaults(&player, &settings, &tracks);

    enable_raw_mode()?;
    let mut library = event_loop::Library {
        tracks: &mut tracks,
        order: &mut order,
        kv: kv.as_ref(),
    };
    let run_result = event_loop::run(&settings, &mut library, &player, &control_rx);
    disable_raw_mode()?;
    println!();

    if run_result.is_err() {
        player.quit_softly(Duration::ZERO);
    }
    info!("xmvisio exiting");
    drop(stream);
    run_result
}
