use std::path::PathBuf;

use adgui_core::platform::AppPaths;

#[derive(Default)]
pub struct LinuxPaths;

impl AppPaths for LinuxPaths {
    fn config_path(&self) -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adgui")
            .join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("adgui")
    }
}
