//! In-memory [`MediaBackend`] for tests: counts live resources and lets tests
//! script failures and completions.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PlaybackError;
use crate::library::{Track, TrackId};

use super::backend::{MediaBackend, MediaResource};

pub fn track(name: &str, secs: u64) -> Track {
    let path = PathBuf::from(format!("/music/{name}.mp3"));
    Track {
        id: TrackId::from_path(&path),
        path,
        title: name.to_string(),
        artist: None,
        album: None,
        duration: Some(Duration::from_secs(secs)),
        date_added: None,
        display: name.to_string(),
    }
}

#[derive(Default)]
pub struct Shared {
    pub live: AtomicUsize,
    pub opened: Mutex<Vec<TrackId>>,
    pub failing: Mutex<HashSet<TrackId>>,
    pub finished: Mutex<HashSet<TrackId>>,
    pub playing: Mutex<HashSet<TrackId>>,
    pub seeks: Mutex<Vec<(TrackId, Duration)>>,
    pub speeds: Mutex<Vec<f32>>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub shared: Arc<Shared>,
}

impl FakeBackend {
    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn fail(&self, id: TrackId) {
        self.shared.failing.lock().unwrap().insert(id);
    }

    /// Make every resource for `id` report that it ran dry.
    pub fn finish(&self, id: TrackId) {
        self.shared.finished.lock().unwrap().insert(id);
    }

    pub fn is_playing(&self, id: TrackId) -> bool {
        self.shared.playing.lock().unwrap().contains(&id)
    }

    pub fn seeks(&self) -> Vec<(TrackId, Duration)> {
        self.shared.seeks.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<TrackId> {
        self.shared.opened.lock().unwrap().clone()
    }
}

impl MediaBackend for FakeBackend {
    fn open(&self, track: &Track) -> Result<Box<dyn MediaResource>, PlaybackError> {
        if self.shared.failing.lock().unwrap().contains(&track.id) {
            return Err(PlaybackError::Decode {
                path: track.path.clone(),
                reason: "unrecognized format".to_string(),
            });
        }
        self.shared.opened.lock().unwrap().push(track.id);
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeResource {
            id: track.id,
            shared: self.shared.clone(),
        }))
    }
}

struct FakeResource {
    id: TrackId,
    shared: Arc<Shared>,
}

impl MediaResource for FakeResource {
    fn play(&mut self) {
        self.shared.playing.lock().unwrap().insert(self.id);
    }

    fn pause(&mut self) {
        self.shared.playing.lock().unwrap().remove(&self.id);
    }

    fn seek(&mut self, offset: Duration) -> Result<(), PlaybackError> {
        self.shared.seeks.lock().unwrap().push((self.id, offset));
        Ok(())
    }

    fn set_speed(&mut self, speed: f32) {
        self.shared.speeds.lock().unwrap().push(speed);
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn is_finished(&self) -> bool {
        self.shared.finished.lock().unwrap().contains(&self.id)
    }
}

impl Drop for FakeResource {
    fn drop(&mut self) {
        self.shared.playing.lock().unwrap().remove(&self.id);
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}
