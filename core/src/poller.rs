//! Background status polling.
//!
//! The loop runs a check after an initial delay and then on a fixed interval.
//! A recheck request cuts the interval short; after serving it the loop sleeps
//! for the settle delay before listening again, so a burst of requests right
//! after a connect or disconnect collapses into one extra check.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub settle_delay: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            interval: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    recheck: bool,
    stop: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Wake {
    Timeout,
    Recheck,
    Stop,
}

#[derive(Debug, Default)]
struct Control {
    flags: Mutex<Flags>,
    wake: Condvar,
}

impl Control {
    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for `timeout` unless stopped, or, when `accept_recheck` is set,
    /// until a recheck is requested. An ignored recheck stays pending. A
    /// timeout too large to represent as an `Instant` never expires.
    fn wait(&self, timeout: Duration, accept_recheck: bool) -> Wake {
        let deadline = Instant::now().checked_add(timeout);
        let mut flags = self.lock();
        loop {
            if flags.stop {
                return Wake::Stop;
            }
            if accept_recheck && flags.recheck {
                flags.recheck = false;
                return Wake::Recheck;
            }
            flags = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Wake::Timeout;
                    }
                    self.wake
                        .wait_timeout(flags, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self.wake.wait(flags).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    fn request_recheck(&self) {
        self.lock().recheck = true;
        self.wake.notify_all();
    }

    fn request_stop(&self) {
        self.lock().stop = true;
        self.wake.notify_all();
    }
}

/// Owns the polling thread. Dropping it stops the thread.
pub struct Poller {
    settings: PollerSettings,
    control: Arc<Control>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(settings: PollerSettings) -> Self {
        Self {
            settings,
            control: Arc::new(Control::default()),
            handle: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> PollerSettings {
        self.settings
    }

    /// Starts the polling thread; `check` runs once per cycle on that thread.
    pub fn start<F>(&self, check: F)
    where
        F: Fn() + Send + 'static,
    {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() {
            warn!("Status poller is already running");
            return;
        }
        self.control.lock().stop = false;

        let control = Arc::clone(&self.control);
        let settings = self.settings;
        let spawned = thread::Builder::new()
            .name("adgui-poller".to_string())
            .spawn(move || run_loop(&control, settings, check));

        match spawned {
            Ok(join) => *handle = Some(join),
            Err(e) => warn!("failed to start status poller: {e}"),
        }
    }

    /// Asks for a check as soon as the loop is listening. Requests made while
    /// one is pending are merged.
    pub fn request_recheck(&self) {
        debug!("status recheck requested");
        self.control.request_recheck();
    }

    /// Stops the thread and waits for an in-flight check to finish.
    pub fn stop(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        info!("Stopping status poller");
        self.control.request_stop();
        if handle.join().is_err() {
            warn!("status poller thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<F: Fn()>(control: &Control, settings: PollerSettings, check: F) {
    info!(
        "Status poller started (every {:?}, settle {:?})",
        settings.interval, settings.settle_delay
    );

    if control.wait(settings.initial_delay, true) == Wake::Stop {
        info!("Status poller stopped");
        return;
    }
    check();

    loop {
        match control.wait(settings.interval, true) {
            Wake::Stop => break,
            Wake::Timeout => check(),
            Wake::Recheck => {
                check();
                if control.wait(settings.settle_delay, false) == Wake::Stop {
                    break;
                }
            }
        }
    }

    info!("Status poller stopped");
}
