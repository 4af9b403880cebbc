//! Configuration module for the vision controller.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for the settings location, TOML persistence via
//! `AppConfig::load_from` / `AppConfig::save_to`, and the live [`ConfigStore`]
//! shared by every component.

pub mod paths;
pub mod settings;
pub mod store;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, NotificationConfig, PlaybackConfig, RemoteConfig, ServerConfig, TelemetryConfig,
    TriggerConfig,
};
pub use store::ConfigStore;
