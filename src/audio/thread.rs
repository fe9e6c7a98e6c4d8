use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::playlist::PlaylistController;

use super::types::AudioCmd;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, PartialEq, Eq)]
pub(super) enum Flow {
    Continue,
    Quit,
}

pub(super) fn spawn_audio_thread(
    mut controller: PlaylistController,
    rx: Receiver<AudioCmd>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("audio-player".to_string())
        .spawn(move || {
            loop {
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(cmd) => {
                        if dispatch(&mut controller, cmd) == Flow::Quit {
                            break;
                        }
                    }
                    // Periodic check for natural completion.
                    Err(RecvTimeoutError::Timeout) => controller.poll(),
                    Err(RecvTimeoutError::Disconnected) => {
                        controller.release();
                        break;
                    }
                }
            }
            info!("audio thread exiting");
        })
}

/// Apply one command to the controller. Errors are logged, never propagated.
pub(super) fn dispatch(controller: &mut PlaylistController, cmd: AudioCmd) -> Flow {
    debug!(?cmd, "audio command");
    let result = match cmd {
        AudioCmd::SetPlaylist { tracks, start_at } => controller.set_playlist(tracks, start_at),
        AudioCmd::Play => controller.play(),
        AudioCmd::Pause => controller.pause(),
        AudioCmd::TogglePause => controller.toggle_pause(),
        AudioCmd::Stop => {
            controller.stop();
            Ok(())
        }
        AudioCmd::Next => {
            if !controller.next() {
                debug!("already at the last track");
            }
            Ok(())
        }
        AudioCmd::Prev => {
            if !controller.previous() {
                debug!("already at the first track");
            }
            Ok(())
        }
        AudioCmd::SeekTo(d) => controller.seek(d).map(|_| ()),
        AudioCmd::Rewind(d) => controller.rewind(d).map(|_| ()),
        AudioCmd::FastForward(d) => controller.fast_forward(d).map(|_| ()),
        AudioCmd::SetSpeed(s) => controller.set_speed(s),
        AudioCmd::NudgeSpeed(delta) => controller.nudge_speed(delta),
        AudioCmd::SetSleep(mode) => {
            controller.set_sleep(mode);
            Ok(())
        }
        AudioCmd::ToggleStopAtEnd => {
            controller.toggle_stop_at_end();
            Ok(())
        }
        AudioCmd::Interrupted(i) => {
            controller.on_interruption(i);
            Ok(())
        }
        AudioCmd::Prepared { generation, result } => {
            controller.on_prepared(generation, result).map(|_| ())
        }
        AudioCmd::Tick(kind) => {
            controller.on_tick(kind);
            Ok(())
        }
        AudioCmd::Quit { fade_out_ms } => {
            controller.shutdown(Duration::from_millis(fade_out_ms));
            return Flow::Quit;
        }
    };

    if let Err(e) = result {
        warn!(error = %e, kind = ?e.kind(), "audio command failed");
    }
    Flow::Continue
}
