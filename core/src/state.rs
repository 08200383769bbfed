//! The engine's record of the current connection.
//!
//! One `RwLock` guards every field. Callers never hold it across a client
//! invocation: run the command first, then take the lock for the short
//! read-modify-write.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Local};
use log::info;

use crate::exclusions::ExclusionMode;
use crate::status::{DISCONNECTED_MARKER, StatusReading};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    /// Empty whenever `connected` is false.
    pub location: String,
    /// Last full `status` output, for display.
    pub raw_status: String,
    /// Last mode seen or applied; display only.
    pub exclusion_mode: Option<ExclusionMode>,
    /// Time of the last successful status check.
    pub checked_at: Option<DateTime<Local>>,
}

impl ConnectionState {
    /// Tray label such as `FRANKFURT mode:GEN`, or `OFF`.
    pub fn summary(&self) -> String {
        if !self.connected {
            return "OFF".to_string();
        }
        let mode = self.exclusion_mode.unwrap_or_default();
        format!("{} mode:{}", self.location.to_uppercase(), mode.short_label())
    }

    fn set_connected(&mut self, location: String) {
        self.connected = true;
        self.location = location;
    }

    fn set_disconnected(&mut self) {
        self.connected = false;
        self.location.clear();
    }
}

#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<ConnectionState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ConnectionState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConnectionState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent copy of every field.
    pub fn snapshot(&self) -> ConnectionState {
        self.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.read().connected
    }

    pub fn location(&self) -> String {
        self.read().location.clone()
    }

    pub fn raw_status(&self) -> String {
        self.read().raw_status.clone()
    }

    pub fn exclusion_mode(&self) -> Option<ExclusionMode> {
        self.read().exclusion_mode
    }

    /// Records a status check. `Unrecognized` keeps the previous connection
    /// fields; only the raw text and timestamp move. Returns whether the
    /// connection or raw text changed.
    pub fn apply_status(&self, raw: String, reading: &StatusReading) -> bool {
        let mut state = self.write();
        let before = (state.connected, state.location.clone());

        match reading {
            StatusReading::Disconnected => state.set_disconnected(),
            StatusReading::Connected(location) => state.set_connected(location.clone()),
            StatusReading::Unrecognized => {}
        }
        let raw_changed = state.raw_status != raw;
        state.raw_status = raw;
        state.checked_at = Some(Local::now());

        let transitioned = before != (state.connected, state.location.clone());
        if transitioned {
            log_transition(&state);
        }
        transitioned || raw_changed
    }

    /// Marks the tunnel up at `location`. Returns whether anything changed.
    pub fn set_connected(&self, location: String) -> bool {
        let mut state = self.write();
        if state.connected && state.location == location {
            return false;
        }
        state.set_connected(location);
        log_transition(&state);
        true
    }

    /// Marks the tunnel down and clears the location in the same write.
    pub fn set_disconnected(&self) -> bool {
        let mut state = self.write();
        let changed = state.connected || !state.location.is_empty();
        state.set_disconnected();
        state.raw_status = DISCONNECTED_MARKER.to_string();
        if changed {
            log_transition(&state);
        }
        changed
    }

    pub fn set_exclusion_mode(&self, mode: ExclusionMode) {
        self.write().exclusion_mode = Some(mode);
    }
}

fn log_transition(state: &ConnectionState) {
    if state.connected {
        info!("VPN connected to {}", state.location);
    } else {
        info!("VPN disconnected");
    }
}

/// "Last checked" text for a status check timestamp.
pub fn format_checked_at(checked_at: &Option<DateTime<Local>>) -> String {
    match checked_at {
        Some(dt) => {
            let relative = humantime_fmt::format_relative((*dt).into());
            format!("{relative} (at {})", dt.format("%H:%M:%S"))
        }
        None => "Never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let store = StateStore::new();
        assert!(!store.is_connected());
        assert_eq!(store.location(), "");
        assert_eq!(store.snapshot().summary(), "OFF");
    }

    #[test]
    fn connected_reading_sets_location() {
        let store = StateStore::new();
        let changed = store.apply_status(
            "Connected to FRANKFURT in TUN mode".to_string(),
            &StatusReading::Connected("FRANKFURT".to_string()),
        );
        assert!(changed);
        assert!(store.is_connected());
        assert_eq!(store.location(), "FRANKFURT");
        assert_eq!(store.raw_status(), "Connected to FRANKFURT in TUN mode");
        assert!(store.snapshot().checked_at.is_some());
    }

    #[test]
    fn disconnected_reading_clears_location() {
        let store = StateStore::new();
        store.set_connected("Riga".to_string());
        store.apply_status(
            "VPN is disconnected".to_string(),
            &StatusReading::Disconnected,
        );
        let state = store.snapshot();
        assert!(!state.connected);
        assert!(state.location.is_empty());
    }

    #[test]
    fn unrecognized_reading_keeps_connection() {
        let store = StateStore::new();
        store.set_connected("Riga".to_string());
        let changed = store.apply_status("garbage".to_string(), &StatusReading::Unrecognized);
        assert!(changed, "raw text changed");
        assert!(store.is_connected());
        assert_eq!(store.location(), "Riga");
        assert_eq!(store.raw_status(), "garbage");
    }

    #[test]
    fn identical_reading_reports_no_change() {
        let store = StateStore::new();
        let reading = StatusReading::Connected("Oslo".to_string());
        assert!(store.apply_status("Connected to Oslo".to_string(), &reading));
        assert!(!store.apply_status("Connected to Oslo".to_string(), &reading));
    }

    #[test]
    fn set_connected_is_idempotent() {
        let store = StateStore::new();
        assert!(store.set_connected("Paris".to_string()));
        assert!(!store.set_connected("Paris".to_string()));
        assert!(store.set_connected("Milan".to_string()));
    }

    #[test]
    fn set_disconnected_resets_raw_status() {
        let store = StateStore::new();
        store.set_connected("Paris".to_string());
        assert!(store.set_disconnected());
        assert_eq!(store.raw_status(), DISCONNECTED_MARKER);
        assert!(!store.set_disconnected());
    }

    #[test]
    fn summary_includes_mode() {
        let store = StateStore::new();
        store.set_connected("Frankfurt".to_string());
        assert_eq!(store.snapshot().summary(), "FRANKFURT mode:GEN");
        store.set_exclusion_mode(ExclusionMode::Selective);
        assert_eq!(store.snapshot().summary(), "FRANKFURT mode:SEL");
    }

    #[test]
    fn never_checked() {
        assert_eq!(format_checked_at(&None), "Never");
        assert!(format_checked_at(&Some(Local::now())).contains("(at "));
    }
}
