//! `rodio`-backed [`MediaBackend`]: one paused `Sink` per opened track.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rodio::mixer::Mixer;
use rodio::{Decoder, Sink, Source};
use tracing::debug;

use crate::error::PlaybackError;
use crate::library::Track;

use super::backend::{MediaBackend, MediaResource};

pub struct RodioBackend {
    mixer: Mixer,
}

impl RodioBackend {
    pub fn new(mixer: Mixer) -> Self {
        Self { mixer }
    }
}

impl MediaBackend for RodioBackend {
    fn open(&self, track: &Track) -> Result<Box<dyn MediaResource>, PlaybackError> {
        let sink = connect_at(&self.mixer, &track.path, Duration::ZERO)?;
        Ok(Box::new(RodioResource {
            sink,
            mixer: self.mixer.clone(),
            path: track.path.clone(),
            speed: 1.0,
            volume: 1.0,
        }))
    }
}

/// Create a paused `Sink` for `path` that starts playback at `start_at`.
fn connect_at(mixer: &Mixer, path: &Path, start_at: Duration) -> Result<Sink, PlaybackError> {
    let file = File::open(path).map_err(|source| PlaybackError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| PlaybackError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        // `skip_duration` is the fallback seeking primitive; Duration::ZERO is a no-op.
        .skip_duration(start_at);

    let sink = Sink::connect_new(mixer);
    sink.append(source);
    sink.pause();
    Ok(sink)
}

struct RodioResource {
    sink: Sink,
    mixer: Mixer,
    path: PathBuf,
    speed: f32,
    volume: f32,
}

impl MediaResource for RodioResource {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, offset: Duration) -> Result<(), PlaybackError> {
        let Err(e) = self.sink.try_seek(offset) else {
            return Ok(());
        };

        // Not every decoder seeks; rebuild the sink and skip into the file instead.
        debug!(path = %self.path.display(), error = %e, "seek unsupported, reopening");
        let fresh = connect_at(&self.mixer, &self.path, offset).map_err(|_| PlaybackError::Seek(offset))?;
        fresh.set_speed(self.speed);
        fresh.set_volume(self.volume);
        if !self.sink.is_paused() {
            fresh.play();
        }
        self.sink.stop();
        self.sink = fresh;
        Ok(())
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        self.sink.set_speed(speed);
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.sink.set_volume(volume);
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}
