//! Single-slot change signal between the engine and its observer.
//!
//! At most one notification is pending at a time; raising the signal while
//! one is queued does nothing. Observers therefore get at least one callback
//! per burst of changes and must re-query state instead of counting calls.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

pub struct ChangeSignal {
    tx: SyncSender<()>,
    rx: Mutex<Option<Receiver<()>>>,
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSignal {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::sync_channel(1);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Raises the signal unless a notification is already pending.
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => debug!("change notification already pending"),
            Err(TrySendError::Disconnected(())) => debug!("no change observer attached"),
        }
    }

    /// Runs `callback` on a dedicated thread for every delivered notification.
    /// Only one observer can be attached; later calls return `None`.
    pub fn subscribe<F>(&self, callback: F) -> Option<JoinHandle<()>>
    where
        F: Fn() + Send + 'static,
    {
        let Some(rx) = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            warn!("change observer already registered");
            return None;
        };

        let spawned = thread::Builder::new()
            .name("adgui-notify".to_string())
            .spawn(move || {
                // Ends once every sender is gone.
                for () in rx {
                    callback();
                }
                debug!("change observer stopped");
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("failed to start change observer thread: {e}");
                None
            }
        }
    }

    /// Takes the raw receiver for callers that want to drive delivery
    /// themselves, such as a UI event loop polling with `try_recv`.
    pub fn take_receiver(&self) -> Option<Receiver<()>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn redundant_notifications_coalesce() {
        let signal = ChangeSignal::new();
        let rx = signal.take_receiver().unwrap();

        signal.notify();
        signal.notify();
        signal.notify();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn notification_after_delivery_is_queued_again() {
        let signal = ChangeSignal::new();
        let rx = signal.take_receiver().unwrap();

        signal.notify();
        rx.try_recv().unwrap();
        signal.notify();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn only_one_observer() {
        let signal = ChangeSignal::new();
        assert!(signal.subscribe(|| {}).is_some());
        assert!(signal.subscribe(|| {}).is_none());
        assert!(signal.take_receiver().is_none());
    }

    #[test]
    fn callback_runs_and_thread_exits_with_signal() {
        let signal = ChangeSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = signal
            .subscribe(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        signal.notify();
        for _ in 0..100 {
            if calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(calls.load(Ordering::SeqCst) >= 1);

        drop(signal);
        handle.join().unwrap();
    }

    #[test]
    fn notify_without_observer_does_not_block() {
        let signal = ChangeSignal::new();
        drop(signal.take_receiver());
        signal.notify();
        signal.notify();
    }
}
