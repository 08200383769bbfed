use std::collections::HashMap;

use adgui_core::exclusions::SiteExclusions;
use adgui_core::locations::{Location, SortColumn, SortOrder};
use adgui_core::state::{ConnectionState, format_checked_at};
use log::debug;
use tray_icon::menu::{IsMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu};

pub struct MenuHandles {
    pub status_item: MenuItem,
    pub checked_item: MenuItem,
    pub connect_best: MenuItem,
    pub connect_to: Submenu,
    pub locations: Vec<LocationHandle>,
    pub sort_items: Vec<(SortColumn, MenuItem)>,
    pub refresh_locations_id: MenuId,
    pub exclusions_item: MenuItem,
    pub switch_mode_item: MenuItem,
    pub export_id: MenuId,
    pub import_id: MenuId,
    pub disconnect: MenuItem,
    pub license_id: MenuId,
    pub open_config_id: MenuId,
    pub quit_id: MenuId,
}

pub struct LocationHandle {
    pub city: String,
    pub item: MenuItem,
}

fn append(menu: &Menu, item: &dyn IsMenuItem, what: &str) {
    if let Err(e) = menu.append(item) {
        debug!("failed to append {what}: {e}");
    }
}

fn append_to(submenu: &Submenu, item: &dyn IsMenuItem, what: &str) {
    if let Err(e) = submenu.append(item) {
        debug!("failed to append {what}: {e}");
    }
}

pub fn build_menu(sort: &SortOrder) -> (Menu, MenuHandles) {
    let menu = Menu::new();

    let status_item = MenuItem::new("OFF", false, None);
    append(&menu, &status_item, "status label");

    let checked_item = MenuItem::new("Last checked: Never", false, None);
    append(&menu, &checked_item, "last-checked label");
    append(&menu, &PredefinedMenuItem::separator(), "separator");

    let connect_best = MenuItem::new("Connect the best", true, None);
    append(&menu, &connect_best, "connect item");

    let connect_to = Submenu::new("Connect To", true);
    append_to(&connect_to, &PredefinedMenuItem::separator(), "separator");
    let sort_by = Submenu::new("Sort by", true);
    let sort_items: Vec<_> = SortColumn::ALL
        .into_iter()
        .map(|column| {
            let item = MenuItem::new(sort.header(column), true, None);
            append_to(&sort_by, &item, "sort item");
            (column, item)
        })
        .collect();
    append_to(&connect_to, &sort_by, "sort submenu");
    let refresh_locations = MenuItem::new("Refresh list", true, None);
    append_to(&connect_to, &refresh_locations, "refresh item");
    append(&menu, &connect_to, "locations submenu");

    let exclusions = Submenu::new("Site exclusions", true);
    let exclusions_item = MenuItem::new("Domains: loading", false, None);
    append_to(&exclusions, &exclusions_item, "exclusions label");
    let switch_mode_item = MenuItem::new("Switch mode", false, None);
    append_to(&exclusions, &switch_mode_item, "switch-mode item");
    append_to(&exclusions, &PredefinedMenuItem::separator(), "separator");
    let export = MenuItem::new("Export list", true, None);
    append_to(&exclusions, &export, "export item");
    let import = MenuItem::new("Import lists", true, None);
    append_to(&exclusions, &import, "import item");
    append(&menu, &exclusions, "exclusions submenu");

    append(&menu, &PredefinedMenuItem::separator(), "separator");
    let disconnect = MenuItem::new("Disconnect", false, None);
    append(&menu, &disconnect, "disconnect item");
    append(&menu, &PredefinedMenuItem::separator(), "separator");

    let license = MenuItem::new("License", true, None);
    append(&menu, &license, "license item");

    let open_config = MenuItem::new("Open config folder", true, None);
    append(&menu, &open_config, "open-config item");

    let quit = MenuItem::new("Quit", true, None);
    append(&menu, &quit, "quit item");

    let handles = MenuHandles {
        status_item,
        checked_item,
        connect_best,
        connect_to,
        locations: Vec::new(),
        sort_items,
        refresh_locations_id: refresh_locations.id().clone(),
        exclusions_item,
        switch_mode_item,
        export_id: export.id().clone(),
        import_id: import.id().clone(),
        disconnect,
        license_id: license.id().clone(),
        open_config_id: open_config.id().clone(),
        quit_id: quit.id().clone(),
    };

    (menu, handles)
}

/// Replaces the entries of the "Connect To" submenu, keeping its footer.
pub fn set_locations(handles: &mut MenuHandles, locations: &[Location]) {
    for old in handles.locations.drain(..) {
        if let Err(e) = handles.connect_to.remove(&old.item) {
            debug!("failed to remove location item: {e}");
        }
    }

    for (position, location) in locations.iter().enumerate() {
        let item = MenuItem::new(location.to_string(), true, None);
        if let Err(e) = handles.connect_to.insert(&item, position) {
            debug!("failed to insert location item: {e}");
            continue;
        }
        handles.locations.push(LocationHandle {
            city: location.city.clone(),
            item,
        });
    }
    debug!("Location menu holds {} entries", handles.locations.len());
}

pub fn refresh_sort_labels(handles: &MenuHandles, sort: &SortOrder) {
    for (column, item) in &handles.sort_items {
        item.set_text(sort.header(*column));
    }
}

pub fn refresh_labels(
    handles: &MenuHandles,
    state: &ConnectionState,
    exclusions: Option<&SiteExclusions>,
) {
    handles.status_item.set_text(state.summary());
    handles
        .checked_item
        .set_text(format!("Last checked: {}", format_checked_at(&state.checked_at)));
    handles.connect_best.set_enabled(!state.connected);
    handles.disconnect.set_enabled(state.connected);

    match exclusions {
        Some(list) => {
            handles.exclusions_item.set_text(format!(
                "Domains: {} ({})",
                list.domains.len(),
                list.mode.short_label()
            ));
            handles
                .switch_mode_item
                .set_text(format!("Switch to {} mode", list.mode.toggled()));
            handles.switch_mode_item.set_enabled(true);
        }
        None => {
            handles.exclusions_item.set_text("Domains: unavailable");
            handles.switch_mode_item.set_enabled(false);
        }
    }
}

pub fn build_id_lookup(handles: &MenuHandles) -> HashMap<MenuId, MenuAction> {
    let mut map = HashMap::new();
    map.insert(handles.connect_best.id().clone(), MenuAction::ConnectBest);
    for loc in &handles.locations {
        map.insert(loc.item.id().clone(), MenuAction::ConnectTo(loc.city.clone()));
    }
    for (column, item) in &handles.sort_items {
        map.insert(item.id().clone(), MenuAction::SortBy(*column));
    }
    map.insert(
        handles.refresh_locations_id.clone(),
        MenuAction::RefreshLocations,
    );
    map.insert(
        handles.switch_mode_item.id().clone(),
        MenuAction::SwitchExclusionMode,
    );
    map.insert(handles.export_id.clone(), MenuAction::ExportExclusions);
    map.insert(handles.import_id.clone(), MenuAction::ImportExclusions);
    map.insert(handles.disconnect.id().clone(), MenuAction::Disconnect);
    map.insert(handles.license_id.clone(), MenuAction::ShowLicense);
    map.insert(handles.open_config_id.clone(), MenuAction::OpenConfig);
    map.insert(handles.quit_id.clone(), MenuAction::Quit);
    map
}

#[derive(Clone, Debug)]
pub enum MenuAction {
    ConnectBest,
    ConnectTo(String),
    SortBy(SortColumn),
    RefreshLocations,
    SwitchExclusionMode,
    ExportExclusions,
    ImportExclusions,
    Disconnect,
    ShowLicense,
    OpenConfig,
    Quit,
}
