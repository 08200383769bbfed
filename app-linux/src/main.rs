//! Linux tray shell for adgui.
//! Shows VPN state in a status icon and exposes connect/disconnect and
//! site-exclusion controls backed by the core engine.

mod app;
mod exclusions_file;
mod license;
mod menu;
mod paths;

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use adgui_core::Action;
use adgui_core::locations::{Location, SortOrder};
use adgui_core::platform::AppPaths;
use gtk::glib;
use log::{debug, info, warn};
use tray_icon::menu::MenuEvent;
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::app::AppState;
use crate::menu::{
    MenuAction, MenuHandles, build_id_lookup, build_menu, refresh_labels, refresh_sort_labels,
    set_locations,
};
use crate::paths::LinuxPaths;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("starting adgui (linux tray)");

    gtk::init().expect("failed to init GTK"); // required for tray-icon on Linux

    let app_state = AppState::new();
    let running = Arc::new(AtomicBool::new(true));

    let changes = app_state
        .manager
        .change_receiver()
        .expect("change receiver is taken once at startup");

    let (connected_icon, disconnected_icon) = build_icons();
    // Locations arrive from a background fetch started by AppState::new.
    let sort = SortOrder::default();
    let (menu, handles) = build_menu(&sort);
    let id_lookup = build_id_lookup(&handles);

    let tray_icon = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_icon(disconnected_icon.clone())
        .with_tooltip("adgui: VPN disconnected")
        .build()
        .expect("failed to create tray icon");

    // Ctrl+C cleanup
    {
        let manager = app_state.manager.clone();
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("received signal, stopping status poller and exiting");
            manager.shutdown();
            running.store(false, Ordering::SeqCst);
        })
        .expect("Error setting Ctrl-C handler");
    }

    let mut looper = EventLoop {
        tray_icon,
        handles,
        id_lookup,
        app_state,
        changes,
        sort,
        locations: Vec::new(),
        connected_icon,
        disconnected_icon,
        shown_connected: None,
        running,
        last_label_refresh: Instant::now(),
    };

    looper.run();
}

struct EventLoop {
    tray_icon: TrayIcon,
    handles: MenuHandles,
    id_lookup: std::collections::HashMap<muda::MenuId, MenuAction>,
    app_state: AppState,
    changes: Receiver<()>,
    sort: SortOrder,
    locations: Vec<Location>,
    connected_icon: Icon,
    disconnected_icon: Icon,
    shown_connected: Option<bool>,
    running: Arc<AtomicBool>,
    last_label_refresh: Instant,
}

impl EventLoop {
    fn run(&mut self) {
        info!("tray icon ready; entering event loop");

        while self.running.load(Ordering::SeqCst) {
            // Process menu events (non-blocking)
            while let Ok(event) = MenuEvent::receiver().try_recv() {
                self.handle_menu_event(event.id);
            }

            let mut redraw = self.app_state.dirty.swap(false, Ordering::SeqCst);
            match self.changes.try_recv() {
                Ok(()) => redraw = true,
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => debug!("engine change signal closed"),
            }
            // Keep the "Last checked" label current
            if self.last_label_refresh.elapsed() > Duration::from_secs(15) {
                redraw = true;
            }
            if redraw {
                self.redraw();
            }

            glib::idle_add_local_once(|| {}); // allow GTK to process pending work
            while gtk::events_pending() {
                gtk::main_iteration_do(false);
            }

            thread::sleep(Duration::from_millis(50));
        }

        info!("exiting event loop; cleaning up");
        self.app_state.cleanup();
    }

    fn handle_menu_event(&mut self, id: muda::MenuId) {
        let Some(action) = self.id_lookup.get(&id).cloned() else {
            return;
        };
        debug!("menu action {:?}", action);

        match action {
            MenuAction::ConnectBest => self.dispatch(Action::ConnectAuto),
            MenuAction::ConnectTo(city) => self.dispatch(Action::ConnectTo(city)),
            MenuAction::Disconnect => self.dispatch(Action::Disconnect),
            MenuAction::SortBy(column) => {
                self.sort.select(column);
                refresh_sort_labels(&self.handles, &self.sort);
                self.sort.apply(&mut self.locations);
                self.show_locations();
            }
            MenuAction::RefreshLocations => self.app_state.reload_locations(),
            MenuAction::SwitchExclusionMode => self.app_state.switch_exclusion_mode(),
            MenuAction::ExportExclusions => self.app_state.export_exclusions(),
            MenuAction::ImportExclusions => self.app_state.import_exclusions(),
            MenuAction::ShowLicense => self.app_state.fetch_license(),
            MenuAction::OpenConfig => open_config(&self.app_state.paths),
            MenuAction::Quit => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn dispatch(&self, action: Action) {
        // Workers report through the change signal; nothing to join here.
        let _ = self.app_state.manager.dispatch(action);
    }

    fn show_locations(&mut self) {
        set_locations(&mut self.handles, &self.locations);
        self.id_lookup = build_id_lookup(&self.handles);
    }

    fn redraw(&mut self) {
        if let Some(mut locations) = self.app_state.take_locations() {
            self.sort.apply(&mut locations);
            self.locations = locations;
            self.show_locations();
        }
        if let Some(text) = self.app_state.take_license() {
            license::show(&text);
        }

        let state = self.app_state.manager.snapshot();
        let exclusions = self.app_state.exclusion_snapshot();
        refresh_labels(&self.handles, &state, exclusions.as_ref());
        self.update_icon(state.connected, &state.summary());
        self.last_label_refresh = Instant::now();
    }

    fn update_icon(&mut self, connected: bool, summary: &str) {
        if self.shown_connected == Some(connected) {
            return;
        }
        let icon = if connected {
            self.connected_icon.clone()
        } else {
            self.disconnected_icon.clone()
        };
        if let Err(e) = self.tray_icon.set_icon(Some(icon)) {
            warn!("failed to update tray icon: {e}");
        }
        if let Err(e) = self.tray_icon.set_tooltip(Some(format!("adgui: {summary}"))) {
            warn!("failed to update tray tooltip: {e}");
        }
        self.shown_connected = Some(connected);
    }
}

fn open_config(paths: &LinuxPaths) {
    let config_path = paths.config_path();
    let parent = config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or(config_path);

    info!("opening config folder at {:?}", parent);
    let result = Command::new("xdg-open").arg(&parent).spawn();
    if let Err(e) = result {
        warn!("xdg-open failed: {e}");
    }
}

fn build_icons() -> (Icon, Icon) {
    // Simple 16x16 solid dots; avoid extra assets on Linux
    let connected = solid_icon([0x00, 0xc8, 0x53, 0xff]); // green
    let disconnected = solid_icon([0x80, 0x80, 0x80, 0xff]); // gray
    (connected, disconnected)
}

fn solid_icon(color: [u8; 4]) -> Icon {
    let (width, height) = (16, 16);
    let mut data = Vec::with_capacity(width * height * 4);
    for _ in 0..(width * height) {
        data.extend_from_slice(&color);
    }
    Icon::from_rgba(data, width as u32, height as u32).expect("failed to build icon")
}
