use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::playlist::PlaylistController;

use super::thread::spawn_audio_thread;
use super::types::{AudioCmd, SessionHandle};

/// Handle to the audio thread, which owns the [`PlaylistController`].
pub struct AudioPlayer {
    tx: Sender<AudioCmd>,
    session: SessionHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlayer {
    /// Create the command channel first so the engine and timers can post back to it.
    pub fn channel() -> (Sender<AudioCmd>, Receiver<AudioCmd>) {
        mpsc::channel::<AudioCmd>()
    }

    pub fn spawn(
        controller: PlaylistController,
        tx: Sender<AudioCmd>,
        rx: Receiver<AudioCmd>,
    ) -> std::io::Result<Self> {
        let session = controller.session_handle();
        let handle = spawn_audio_thread(controller, rx)?;
        Ok(Self {
            tx,
            session,
            join: Mutex::new(Some(handle)),
        })
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn sender(&self) -> Sender<AudioCmd> {
        self.tx.clone()
    }

    pub fn send(&self, cmd: AudioCmd) -> Result<(), mpsc::SendError<AudioCmd>> {
        self.tx.send(cmd)
    }

    pub fn quit_softly(&self, fade_out: Duration) {
        let _ = self.send(AudioCmd::Quit {
            fade_out_ms: u64::try_from(fade_out.as_millis()).unwrap_or(u64::MAX),
        });

        if let Ok(mut j) = self.join.lock() {
            if let Some(h) = j.take() {
                let _ = h.join();
            }
        }
    }
}
