use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rodio::cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, info, warn};

use super::{FocusArbiter, FocusGrant, Interruption};

pub type InterruptFn = Arc<dyn Fn(Interruption) + Send + Sync>;

/// Identity of the current default output device, `None` when there is none.
pub trait OutputProbe: Send + Sync {
    fn default_output(&self) -> Option<String>;
}

/// Asks the platform audio host (ALSA/PulseAudio/CoreAudio/WASAPI) via cpal.
pub struct CpalProbe;

impl OutputProbe for CpalProbe {
    fn default_output(&self) -> Option<String> {
        let device = rodio::cpal::default_host().default_output_device()?;
        Some(device.name().unwrap_or_else(|_| "<unnamed>".to_string()))
    }
}

struct Watcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Watcher {
    fn cancel(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.thread().unpark();
        let _ = self.handle.join();
    }
}

/// Grants focus while an output device exists and watches it while focus is held.
///
/// Desktop platforms have no focus broker, so the only interruption this
/// arbiter raises is [`Interruption::OutputRemoved`].
pub struct DeviceFocusArbiter {
    probe: Arc<dyn OutputProbe>,
    poll: Duration,
    notify: InterruptFn,
    held: bool,
    watcher: Option<Watcher>,
}

impl DeviceFocusArbiter {
    pub fn new(probe: Arc<dyn OutputProbe>, poll: Duration, notify: InterruptFn) -> Self {
        Self {
            probe,
            poll,
            notify,
            held: false,
            watcher: None,
        }
    }

    fn spawn_watcher(&self, baseline: String) -> std::io::Result<Watcher> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();
        let probe = self.probe.clone();
        let notify = self.notify.clone();
        let poll = self.poll;

        let handle = thread::Builder::new()
            .name("output-watch".to_string())
            .spawn(move || {
                let mut last = Some(baseline);
                loop {
                    thread::park_timeout(poll);
                    if stop_for_thread.load(Ordering::SeqCst) {
                        break;
                    }
                    let now = probe.default_output();
                    if now == last {
                        continue;
                    }
                    // A device coming back is not an interruption; losing or swapping one is.
                    if last.is_some() {
                        info!(from = ?last, to = ?now, "output device changed");
                        notify(Interruption::OutputRemoved);
                    }
                    last = now;
                }
            })?;

        Ok(Watcher { stop, handle })
    }
}

impl FocusArbiter for DeviceFocusArbiter {
    fn request(&mut self) -> FocusGrant {
        let Some(baseline) = self.probe.default_output() else {
            warn!("no output device, focus denied");
            return FocusGrant::Denied;
        };
        if self.held {
            return FocusGrant::Granted;
        }

        debug!(device = %baseline, "focus granted");
        match self.spawn_watcher(baseline) {
            Ok(w) => self.watcher = Some(w),
            Err(e) => warn!(error = %e, "output watcher unavailable"),
        }
        self.held = true;
        FocusGrant::Granted
    }

    fn abandon(&mut self) {
        self.held = false;
        if let Some(w) = self.watcher.take() {
            w.cancel();
            debug!("focus abandoned");
        }
    }

    fn holds_focus(&self) -> bool {
        self.held
    }
}

impl Drop for DeviceFocusArbiter {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    #[derive(Default)]
    struct ScriptedProbe {
        device: Mutex<Option<String>>,
    }

    impl ScriptedProbe {
        fn set(&self, device: Option<&str>) {
            *self.device.lock().unwrap() = device.map(str::to_string);
        }
    }

    impl OutputProbe for ScriptedProbe {
        fn default_output(&self) -> Option<String> {
            self.device.lock().unwrap().clone()
        }
    }

    fn arbiter(probe: Arc<ScriptedProbe>) -> (DeviceFocusArbiter, mpsc::Receiver<Interruption>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let notify: InterruptFn = Arc::new(move |i| {
            let _ = tx.lock().unwrap().send(i);
        });
        (
            DeviceFocusArbiter::new(probe, Duration::from_millis(5), notify),
            rx,
        )
    }

    #[test]
    fn request_is_denied_without_an_output_device() {
        let probe = Arc::new(ScriptedProbe::default());
        let (mut focus, _rx) = arbiter(probe);
        assert_eq!(focus.request(), FocusGrant::Denied);
        assert!(!focus.holds_focus());
    }

    #[test]
    fn unplugging_the_device_reports_output_removed() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set(Some("speakers"));
        let (mut focus, rx) = arbiter(probe.clone());

        assert_eq!(focus.request(), FocusGrant::Granted);
        assert!(focus.holds_focus());

        probe.set(None);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            Interruption::OutputRemoved
        );

        // Reconnecting is silent.
        probe.set(Some("speakers"));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        focus.abandon();
    }

    #[test]
    fn held_focus_is_rechecked_against_the_device() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set(Some("speakers"));
        let (mut focus, rx) = arbiter(probe.clone());
        assert_eq!(focus.request(), FocusGrant::Granted);

        probe.set(None);
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(focus.request(), FocusGrant::Denied);
        assert!(focus.holds_focus());

        probe.set(Some("headphones"));
        assert_eq!(focus.request(), FocusGrant::Granted);
        focus.abandon();
        assert!(!focus.holds_focus());
    }

    #[test]
    fn abandon_stops_watching() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.set(Some("headphones"));
        let (mut focus, rx) = arbiter(probe.clone());

        assert_eq!(focus.request(), FocusGrant::Granted);
        focus.abandon();
        assert!(!focus.holds_focus());

        probe.set(Some("hdmi"));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
