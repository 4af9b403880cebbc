//! Where `settings.toml` lives.
//!
//! ```text
//! Linux (device):  ~/.config/vision-controller/settings.toml
//! macOS:           ~/Library/Application Support/vision-controller/settings.toml
//! Windows:         %APPDATA%\vision-controller\settings.toml
//! ```
//!
//! `VISION_CONTROLLER_CONFIG=<file>` replaces the whole lookup, which is how
//! the systemd unit on the device points at `/etc`.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "vision-controller";
    const OVERRIDE_VAR: &'static str = "VISION_CONTROLLER_CONFIG";
    const SETTINGS_FILE: &'static str = "settings.toml";

    /// Resolve from the environment override, else the platform config
    /// directory (`.` when the platform has none).
    pub fn new() -> Self {
        match std::env::var_os(Self::OVERRIDE_VAR).filter(|v| !v.is_empty()) {
            Some(file) => Self::for_file(PathBuf::from(file)),
            None => {
                let dir = dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(Self::APP_NAME);
                Self::for_file(dir.join(Self::SETTINGS_FILE))
            }
        }
    }

    /// Paths for an explicit settings file.
    pub fn for_file(settings_file: PathBuf) -> Self {
        let config_dir = settings_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
