use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerKind {
    /// Persist the current position.
    Autosave,
    /// Push a fresh projection to the notification.
    Refresh,
}

pub type TickFn = Arc<dyn Fn(TimerKind) + Send + Sync>;

/// The periodic timers that run while something is playing.
///
/// Both threads stop and are joined on [`cancel`](Self::cancel) or drop, so no
/// tick is delivered after the scope is gone.
pub struct TimerScope {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl TimerScope {
    pub fn start(autosave: Duration, refresh: Duration, tick: TickFn) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(2);
        for (kind, every, name) in [
            (TimerKind::Autosave, autosave, "autosave-timer"),
            (TimerKind::Refresh, refresh, "refresh-timer"),
        ] {
            let stop = stop.clone();
            let tick = tick.clone();
            let spawned = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || run(kind, every, &stop, tick.as_ref()));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => warn!(timer = ?kind, error = %e, "failed to spawn timer"),
            }
        }
        Self { stop, handles }
    }

    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for h in &self.handles {
            h.thread().unpark();
        }
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

impl Drop for TimerScope {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(kind: TimerKind, every: Duration, stop: &AtomicBool, tick: &(dyn Fn(TimerKind) + Send + Sync)) {
    let mut due = Instant::now() + every;
    loop {
        // park_timeout may wake early; only fire once the deadline has passed.
        thread::park_timeout(due.saturating_duration_since(Instant::now()));
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let now = Instant::now();
        if now < due {
            continue;
        }
        tick(kind);
        due = now + every;
    }
    trace!(timer = ?kind, "timer stopped");
}
