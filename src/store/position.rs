use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use tracing::{trace, warn};

use crate::error::StoreError;
use crate::library::TrackId;

use super::kv::KvStore;

const NAMESPACE: &str = "positions";

enum WriteOp {
    Save(TrackId, Duration),
    Clear(TrackId),
    Flush(Sender<()>),
}

/// Last-known playback offset per track, stored as milliseconds.
///
/// Detached writes go through one writer thread, so they land in the order
/// they were issued. The thread exits when the store is dropped.
pub struct PositionStore {
    kv: Arc<dyn KvStore>,
    writer: Sender<WriteOp>,
}

fn write(kv: &dyn KvStore, op: WriteOp) {
    let result = match op {
        WriteOp::Save(id, offset) => kv.set(
            NAMESPACE,
            &id.to_string(),
            offset.as_millis().to_string(),
        ),
        WriteOp::Clear(id) => kv.remove(NAMESPACE, &id.to_string()),
        WriteOp::Flush(done) => {
            let _ = done.send(());
            Ok(())
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "position write failed");
    }
}

impl PositionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        let (tx, rx) = mpsc::channel::<WriteOp>();
        let kv_for_thread = kv.clone();
        let spawned = thread::Builder::new()
            .name("position-writer".to_string())
            .spawn(move || {
                for op in rx {
                    write(kv_for_thread.as_ref(), op);
                }
                trace!("position writer exiting");
            });
        if let Err(e) = spawned {
            // Without the thread every detached write fails with WriterGone and is logged.
            warn!(error = %e, "failed to spawn position writer");
        }
        Self { kv, writer: tx }
    }

    pub fn save(&self, id: TrackId, offset: Duration) -> Result<(), StoreError> {
        self.flush();
        self.kv
            .set(NAMESPACE, &id.to_string(), offset.as_millis().to_string())
    }

    /// Saved offset for `id`, zero when nothing was saved.
    pub fn get(&self, id: TrackId) -> Result<Duration, StoreError> {
        self.flush();
        let key = id.to_string();
        match self.kv.get(NAMESPACE, &key)? {
            None => Ok(Duration::ZERO),
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| StoreError::Malformed {
                    namespace: NAMESPACE.to_string(),
                    key,
                    value: raw,
                }),
        }
    }

    pub fn clear(&self, id: TrackId) -> Result<(), StoreError> {
        self.flush();
        self.kv.remove(NAMESPACE, &id.to_string())
    }

    /// Queue a save without waiting for it.
    pub fn save_detached(&self, id: TrackId, offset: Duration) {
        self.send(WriteOp::Save(id, offset));
    }

    /// Queue a removal without waiting for it.
    pub fn clear_detached(&self, id: TrackId) {
        self.send(WriteOp::Clear(id));
    }

    /// Block until every detached write issued so far has been applied.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        if self.writer.send(WriteOp::Flush(tx)).is_ok() {
            let _ = rx.recv();
        }
    }

    fn send(&self, op: WriteOp) {
        if self.writer.send(op).is_err() {
            warn!(error = %StoreError::WriterGone, "position write dropped");
        }
    }
}
