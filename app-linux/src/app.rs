use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use adgui_core::config::Config;
use adgui_core::exclusions::SiteExclusions;
use adgui_core::locations::Location;
use adgui_core::VpnManager;
use adgui_core::manager::EngineSettings;
use log::{error, info, warn};

use crate::exclusions_file;
use crate::paths::LinuxPaths;

/// Shared application state for the Linux shell.
pub struct AppState {
    pub manager: VpnManager,
    pub paths: Arc<LinuxPaths>,
    /// Last exclusion list fetched from the client, shown in the menu.
    pub exclusions: Arc<Mutex<Option<SiteExclusions>>>,
    /// Freshly fetched location list, waiting for the menu to pick it up.
    pub locations: Arc<Mutex<Option<Vec<Location>>>>,
    /// License text (or the error fetching it), waiting to be shown.
    pub license: Arc<Mutex<Option<String>>>,
    /// Set by background workers when the menu should be redrawn.
    pub dirty: Arc<AtomicBool>,
}

impl AppState {
    pub fn new() -> Self {
        let paths = Arc::new(LinuxPaths::default());

        let config = match Config::load_with(paths.as_ref()) {
            Ok(config) => {
                info!("Loaded configuration successfully");
                config
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                warn!("Using default configuration");
                Config::default()
            }
        };

        let invoker = config.invoker();
        info!("Using VPN client {}", invoker.program());

        let manager = VpnManager::new(
            Arc::new(invoker),
            EngineSettings {
                poller: config.poller_settings(),
                retry_delay: config.retry_delay(),
            },
        );
        manager.start();

        let state = Self {
            manager,
            paths,
            exclusions: Arc::new(Mutex::new(None)),
            locations: Arc::new(Mutex::new(None)),
            license: Arc::new(Mutex::new(None)),
            dirty: Arc::new(AtomicBool::new(true)),
        };
        state.reload_exclusions();
        state.reload_locations();
        state
    }

    /// Fetches the exclusion list in the background.
    pub fn reload_exclusions(&self) {
        let state = self.background();
        thread::spawn(move || state.reload_exclusions());
    }

    pub fn exclusion_snapshot(&self) -> Option<SiteExclusions> {
        self.exclusions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches the location list in the background; see [`AppState::take_locations`].
    pub fn reload_locations(&self) {
        let manager = self.manager.clone();
        fetch_in_background(self.locations.clone(), self.dirty.clone(), move || {
            match manager.list_locations() {
                Ok(list) => {
                    info!("Loaded {} locations", list.len());
                    Some(list)
                }
                Err(e) => {
                    warn!("No locations available: {e}");
                    None
                }
            }
        });
    }

    /// The location list fetched since the last call, if any.
    pub fn take_locations(&self) -> Option<Vec<Location>> {
        take_pending(&self.locations)
    }

    /// Fetches the license text in the background; see [`AppState::take_license`].
    pub fn fetch_license(&self) {
        let manager = self.manager.clone();
        fetch_in_background(self.license.clone(), self.dirty.clone(), move || {
            Some(manager.license_text().unwrap_or_else(|e| {
                error!("license error: {e}");
                format!("Could not read license: {e}")
            }))
        });
    }

    pub fn take_license(&self) -> Option<String> {
        take_pending(&self.license)
    }

    /// Flips between general and selective mode, carrying the current list over.
    pub fn switch_exclusion_mode(&self) {
        let Some(current) = self.exclusion_snapshot() else {
            warn!("exclusion list not loaded yet; ignoring mode switch");
            return;
        };
        let target = current.mode.toggled();
        let state = self.background();
        thread::spawn(move || {
            if let Err(e) = state.manager.set_exclusion_mode(target, &current.domains) {
                error!("set exclusions mode error: {e}");
            }
            state.reload_exclusions();
        });
    }

    pub fn export_exclusions(&self) {
        let Some(current) = self.exclusion_snapshot() else {
            warn!("exclusion list not loaded yet; nothing to export");
            return;
        };
        let dir = exclusions_file::exclusions_dir(self.paths.as_ref());
        if let Err(e) = exclusions_file::export(
            &dir,
            exclusions_file::DEFAULT_EXPORT_NAME,
            &current.domains,
            false,
        ) {
            error!("export exclusions error: {e}");
        }
    }

    /// Adds every domain from the export folder that is not yet listed.
    pub fn import_exclusions(&self) {
        let existing = self.exclusion_snapshot().unwrap_or_default();
        let dir = exclusions_file::exclusions_dir(self.paths.as_ref());
        let state = self.background();
        thread::spawn(move || {
            let mut candidates = Vec::new();
            match exclusions_file::list_files(&dir) {
                Ok(files) => {
                    for file in files {
                        match exclusions_file::read_domains(&file) {
                            Ok(domains) => candidates.extend(domains),
                            Err(e) => warn!("failed to read {:?}: {e}", file),
                        }
                    }
                }
                Err(e) => {
                    error!("import exclusions error: {e}");
                    return;
                }
            }

            let fresh = exclusions_file::new_domains(&existing, candidates);
            info!("Importing {} new site exclusions", fresh.len());
            for domain in fresh {
                if let Err(e) = state.manager.add_exclusion(&domain) {
                    warn!("import of {domain} failed: {e}");
                }
            }
            state.reload_exclusions();
        });
    }

    fn background(&self) -> BackgroundState {
        BackgroundState {
            manager: self.manager.clone(),
            exclusions: self.exclusions.clone(),
            dirty: self.dirty.clone(),
        }
    }

    pub fn cleanup(&self) {
        self.manager.shutdown();
    }
}

/// The parts of `AppState` a worker thread needs to refresh the exclusion list.
struct BackgroundState {
    manager: VpnManager,
    exclusions: Arc<Mutex<Option<SiteExclusions>>>,
    dirty: Arc<AtomicBool>,
}

impl BackgroundState {
    fn reload_exclusions(&self) {
        match self.manager.site_exclusions() {
            Ok(list) => {
                *self.exclusions.lock().unwrap_or_else(PoisonError::into_inner) = Some(list);
            }
            Err(e) => warn!("reload exclusions error: {e}"),
        }
        self.dirty.store(true, Ordering::SeqCst);
    }
}

/// Runs `fetch` on a worker, parks a `Some` result in `slot` and marks the
/// menu dirty either way, so the event loop picks it up on its next pass.
fn fetch_in_background<T, F>(
    slot: Arc<Mutex<Option<T>>>,
    dirty: Arc<AtomicBool>,
    fetch: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnOnce() -> Option<T> + Send + 'static,
{
    thread::spawn(move || {
        if let Some(value) = fetch() {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        }
        dirty.store(true, Ordering::SeqCst);
    })
}

fn take_pending<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn fetch_does_not_block_the_caller() {
        let slot = Arc::new(Mutex::new(None));
        let dirty = Arc::new(AtomicBool::new(false));
        let (release, gate) = mpsc::channel::<()>();

        let handle = fetch_in_background(slot.clone(), dirty.clone(), move || {
            gate.recv_timeout(Duration::from_secs(5)).ok();
            Some(vec!["Riga".to_string()])
        });

        // Still running: nothing parked yet.
        assert!(take_pending(&slot).is_none());
        assert!(!dirty.load(Ordering::SeqCst));

        release.send(()).unwrap();
        handle.join().unwrap();
        assert!(dirty.load(Ordering::SeqCst));
        assert_eq!(take_pending(&slot), Some(vec!["Riga".to_string()]));
        assert!(take_pending(&slot).is_none());
    }

    #[test]
    fn failed_fetch_keeps_previous_value() {
        let slot = Arc::new(Mutex::new(Some(1)));
        let dirty = Arc::new(AtomicBool::new(false));

        fetch_in_background(slot.clone(), dirty.clone(), || None::<i32>)
            .join()
            .unwrap();
        assert!(dirty.load(Ordering::SeqCst));
        assert_eq!(take_pending(&slot), Some(1));
    }
}
