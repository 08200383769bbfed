//! The connection-state engine: queries, commands and the background poller
//! wired together around one `StateStore`.
//!
//! Every public method blocks on the VPN client; UI code calls them from a
//! worker or goes through [`VpnManager::dispatch`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{EngineError, ParseError, Result};
use crate::exclusions::{self, ExclusionMode, SiteExclusions};
use crate::locations::{self, Location};
use crate::platform::CommandRunner;
use crate::poller::{Poller, PollerSettings};
use crate::signal::ChangeSignal;
use crate::state::{ConnectionState, StateStore};
use crate::status::{self, CONNECT_SUCCESS_MARKER, StatusReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub poller: PollerSettings,
    /// Pause after a failed auto-connect before the client-side fallback.
    pub retry_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poller: PollerSettings::default(),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// A user-initiated command that can run off the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ConnectAuto,
    ConnectTo(String),
    Disconnect,
    AddExclusion(String),
    RemoveExclusion(String),
    SetExclusionMode(ExclusionMode, Vec<String>),
    Refresh,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::ConnectAuto => "connect-auto",
            Action::ConnectTo(_) => "connect-to",
            Action::Disconnect => "disconnect",
            Action::AddExclusion(_) => "add-exclusion",
            Action::RemoveExclusion(_) => "remove-exclusion",
            Action::SetExclusionMode(..) => "set-exclusion-mode",
            Action::Refresh => "refresh",
        }
    }
}

/// State shared with the poller thread.
struct Shared {
    runner: Arc<dyn CommandRunner>,
    store: StateStore,
    signal: ChangeSignal,
}

impl Shared {
    fn run(&self, args: &[&str]) -> Result<String> {
        Ok(self.runner.run(args)?)
    }

    /// One status cycle: invoke, parse, record, notify on change. A failed
    /// invocation leaves the state untouched.
    fn check_status(&self) -> Result<StatusReading> {
        let output = self.run(&["status"])?;
        let reading = status::parse_status(&output);
        match &reading {
            StatusReading::Disconnected => debug!("status check: disconnected"),
            StatusReading::Connected(location) => debug!("status check: connected to {location}"),
            StatusReading::Unrecognized => {
                warn!("status check: unrecognized output, keeping previous state")
            }
        }

        if self.store.apply_status(output, &reading) {
            self.signal.notify();
        }
        Ok(reading)
    }
}

/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct VpnManager {
    shared: Arc<Shared>,
    poller: Arc<Poller>,
    retry_delay: Duration,
}

impl VpnManager {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: EngineSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                runner,
                store: StateStore::new(),
                signal: ChangeSignal::new(),
            }),
            poller: Arc::new(Poller::new(settings.poller)),
            retry_delay: settings.retry_delay,
        }
    }

    /// Starts background status polling.
    pub fn start(&self) {
        let shared = Arc::clone(&self.shared);
        self.poller.start(move || {
            if let Err(e) = shared.check_status() {
                warn!("Status check error: {e}");
            }
        });
    }

    /// Stops background polling. Queries and commands keep working.
    pub fn shutdown(&self) {
        self.poller.stop();
    }

    /// Registers the change observer. The callback runs on its own thread and
    /// should re-read state through the query methods.
    pub fn on_change<F>(&self, callback: F) -> bool
    where
        F: Fn() + Send + 'static,
    {
        self.shared.signal.subscribe(callback).is_some()
    }

    /// Change notifications for UIs that poll from their own event loop.
    /// Mutually exclusive with [`VpnManager::on_change`].
    pub fn change_receiver(&self) -> Option<std::sync::mpsc::Receiver<()>> {
        self.shared.signal.take_receiver()
    }

    /// Wakes the poller for an immediate status check.
    pub fn request_recheck(&self) {
        self.poller.request_recheck();
    }

    // Queries

    pub fn is_connected(&self) -> bool {
        self.shared.store.is_connected()
    }

    pub fn current_location(&self) -> String {
        self.shared.store.location()
    }

    pub fn raw_status(&self) -> String {
        self.shared.store.raw_status()
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.shared.store.snapshot()
    }

    /// Mode from the most recent exclusions query or mode switch, if any.
    pub fn exclusion_mode(&self) -> Option<ExclusionMode> {
        self.shared.store.exclusion_mode()
    }

    /// Runs one status check on the calling thread.
    pub fn refresh_status(&self) -> Result<StatusReading> {
        self.shared.check_status()
    }

    /// Fresh location list, fastest first.
    pub fn list_locations(&self) -> Result<Vec<Location>> {
        let output = self.shared.run(&["list-locations"]).inspect_err(|e| {
            error!("List locations error: {e}");
        })?;
        Ok(locations::parse_locations(&output))
    }

    pub fn license_text(&self) -> Result<String> {
        self.shared.run(&["license"])
    }

    /// Current exclusion mode and domains as reported by the client.
    pub fn site_exclusions(&self) -> Result<SiteExclusions> {
        let output = self.shared.run(&["site-exclusions", "show"])?;
        let parsed = exclusions::parse_site_exclusions(&output);
        self.shared.store.set_exclusion_mode(parsed.mode);
        debug!(
            "loaded {} site exclusions in {} mode",
            parsed.domains.len(),
            parsed.mode
        );
        Ok(parsed)
    }

    // Commands

    /// Lets the client pick a location. If its output cannot be read as a
    /// successful connect, connects to the lowest-ping location instead.
    pub fn connect_auto(&self) -> Result<()> {
        let output = match self.shared.run(&["connect"]) {
            Ok(output) => output,
            Err(EngineError::Invocation(e)) => {
                warn!("Could not connect: {e}: {}", e.output().trim());
                // The client may still be tearing down the failed attempt.
                thread::sleep(self.retry_delay);
                e.output().to_string()
            }
            Err(e) => return Err(e),
        };

        if status::confirms_connect(&output)
            && let StatusReading::Connected(location) = status::parse_status(&output)
        {
            info!("Auto-connect picked {location}");
            self.shared.store.set_connected(location);
            self.after_state_command();
            return Ok(());
        }

        let result = self.connect_fastest(&output);
        self.after_state_command();
        result
    }

    fn connect_fastest(&self, connect_output: &str) -> Result<()> {
        let mut candidates = locations::parse_locations(connect_output);
        if candidates.is_empty() {
            debug!("auto-connect output has no location table, listing locations");
            candidates = self.list_locations()?;
        }

        let fastest = locations::find_fastest_location(&candidates).ok_or_else(|| {
            warn!("No locations found for auto-connect");
            ParseError::NoLocations
        })?;
        info!(
            "Falling back to fastest location {} ({} ms)",
            fastest.city, fastest.ping
        );
        let city = fastest.city.clone();
        self.connect_to_location_inner(&city)
    }

    /// Connects to `city` and records it once the client confirms.
    pub fn connect_to_location(&self, city: &str) -> Result<()> {
        let result = self.connect_to_location_inner(city);
        self.after_state_command();
        result
    }

    fn connect_to_location_inner(&self, city: &str) -> Result<()> {
        let city = city.trim();
        if city.is_empty() {
            return Err(EngineError::InvalidLocation(city.to_string()));
        }
        let output = self
            .shared
            .run(&["connect", "-l", city])
            .inspect_err(|e| error!("Connect to location error: {e}"))?;

        if !status::confirms_connect(&output) {
            warn!("Connect to {city} not confirmed: {}", output.trim());
            return Err(ParseError::MissingMarker(CONNECT_SUCCESS_MARKER).into());
        }

        let location = match status::parse_status(&output) {
            StatusReading::Connected(location) => location,
            _ => city.to_string(),
        };
        self.shared.store.set_connected(location);
        Ok(())
    }

    pub fn disconnect(&self) -> Result<()> {
        let result = self
            .shared
            .run(&["disconnect"])
            .inspect_err(|e| error!("Disconnect error: {e}"))
            .map(|_| {
                self.shared.store.set_disconnected();
            });
        self.after_state_command();
        result
    }

    pub fn add_exclusion(&self, domain: &str) -> Result<()> {
        let domain = exclusions::normalize_domain(domain)
            .ok_or_else(|| EngineError::InvalidDomain(domain.to_string()))?;
        self.shared
            .run(&["site-exclusions", "add", &domain])
            .inspect_err(|e| error!("add exclusion error: {e}"))?;
        info!("Added site exclusion {domain}");
        self.shared.signal.notify();
        Ok(())
    }

    pub fn remove_exclusion(&self, domain: &str) -> Result<()> {
        let domain = exclusions::normalize_domain(domain)
            .ok_or_else(|| EngineError::InvalidDomain(domain.to_string()))?;
        self.shared
            .run(&["site-exclusions", "remove", &domain])
            .inspect_err(|e| error!("remove exclusion error: {e}"))?;
        info!("Removed site exclusion {domain}");
        self.shared.signal.notify();
        Ok(())
    }

    /// Switches mode, then re-adds every domain under the new mode. Returns
    /// the number of domains applied; any failures come back together as
    /// [`EngineError::PartialBatch`].
    pub fn set_exclusion_mode(&self, mode: ExclusionMode, domains: &[String]) -> Result<usize> {
        self.shared
            .run(&["site-exclusions", "mode", mode.as_arg()])
            .inspect_err(|e| error!("set exclusions mode error: {e}"))?;
        self.shared.store.set_exclusion_mode(mode);
        info!(
            "Exclusion mode set to {mode}, re-applying {} domains",
            domains.len()
        );

        let mut applied = 0;
        let mut failures = Vec::new();
        for domain in domains {
            match self.shared.run(&["site-exclusions", "add", domain]) {
                Ok(_) => applied += 1,
                Err(e) => {
                    warn!("failed to re-apply {domain}: {e}");
                    failures.push((domain.clone(), e.to_string()));
                }
            }
        }
        self.shared.signal.notify();

        if failures.is_empty() {
            Ok(applied)
        } else {
            Err(EngineError::PartialBatch {
                mode,
                applied,
                failures,
            })
        }
    }

    /// Runs `action` on a short-lived thread, logging any error.
    pub fn dispatch(&self, action: Action) -> Option<JoinHandle<()>> {
        let manager = self.clone();
        let name = action.name();
        let spawned = thread::Builder::new()
            .name(format!("adgui-{name}"))
            .spawn(move || {
                if let Err(e) = manager.perform(action) {
                    error!("{name} failed: {e}");
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("failed to spawn {name} worker: {e}");
                None
            }
        }
    }

    /// Runs `action` on the calling thread.
    pub fn perform(&self, action: Action) -> Result<()> {
        match action {
            Action::ConnectAuto => self.connect_auto(),
            Action::ConnectTo(city) => self.connect_to_location(&city),
            Action::Disconnect => self.disconnect(),
            Action::AddExclusion(domain) => self.add_exclusion(&domain),
            Action::RemoveExclusion(domain) => self.remove_exclusion(&domain),
            Action::SetExclusionMode(mode, domains) => {
                self.set_exclusion_mode(mode, &domains).map(|_| ())
            }
            Action::Refresh => self.refresh_status().map(|_| ()),
        }
    }

    /// Observers re-render after every connect/disconnect attempt, and the
    /// poller confirms the result against `status`.
    fn after_state_command(&self) {
        self.shared.signal.notify();
        self.poller.request_recheck();
    }
}
