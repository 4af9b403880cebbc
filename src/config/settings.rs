//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files, patched as JSON from the
//! dashboard, and shared across tasks.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP/WebSocket server listens on.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteConfig
// ---------------------------------------------------------------------------

/// Connection details for the camera snapshot endpoint and the remote
/// analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the analysis service (`/api/analyze` is appended).
    pub base_url: String,
    /// Access credential sent as the `api_key` query parameter.
    pub api_key: Option<String>,
    /// Full URL of the camera snapshot endpoint.
    pub capture_url: String,
    /// Maximum seconds to wait for a camera snapshot.
    pub capture_timeout_secs: u64,
    /// Maximum seconds to wait for the analyze call (image → speech).
    pub analyze_timeout_secs: u64,
    /// Maximum seconds to spend on the best-effort cancel notice.
    pub cancel_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            capture_url: "http://127.0.0.1:8080/snapshot.jpg".into(),
            capture_timeout_secs: 10,
            analyze_timeout_secs: 120,
            cancel_timeout_secs: 5,
        }
    }
}

impl RemoteConfig {
    /// `true` when both an endpoint and a credential are present, the
    /// precondition for starting a workflow.
    pub fn is_configured(&self) -> bool {
        let key = self.api_key.as_deref().unwrap_or("");
        !self.base_url.trim().is_empty() && !key.trim().is_empty()
    }

    /// Join `path` onto `base_url` without doubling the slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// ---------------------------------------------------------------------------
// TriggerConfig
// ---------------------------------------------------------------------------

/// Physical push-button trigger wired to a GPIO input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Poll the button at all.
    pub enabled: bool,
    /// BCM pin number of the button.
    pub gpio_pin: u32,
    /// The button pulls the line low when pressed (pull-up wiring).
    pub active_low: bool,
    /// Milliseconds between two reads of the pin.
    pub poll_interval_ms: u64,
    /// Milliseconds to ignore the pin after a press has started a workflow.
    pub debounce_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gpio_pin: 17,
            active_low: true,
            poll_interval_ms: 100,
            debounce_ms: 2_000,
        }
    }
}

impl TriggerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Speech playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Milliseconds between two "is the player still busy?" checks.
    pub poll_interval_ms: u64,
    /// Seconds skipped by one forward / backward transport command.
    pub seek_step_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            seek_step_secs: 10.0,
        }
    }
}

/// Largest accepted seek step: one hour.
pub const MAX_SEEK_STEP_SECS: f64 = 3600.0;

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        let step = self.seek_step_secs;
        if !step.is_finite() || step <= 0.0 || step > MAX_SEEK_STEP_SECS {
            bail!("playback.seek_step_secs must be in (0, {MAX_SEEK_STEP_SECS}], got {step}");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NotificationConfig
// ---------------------------------------------------------------------------

/// Notification history kept for replay to newly connected dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Maximum number of entries retained; the oldest is evicted first.
    pub capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

// ---------------------------------------------------------------------------
// TelemetryConfig
// ---------------------------------------------------------------------------

/// Periodic system telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Seconds between two samples.
    pub interval_secs: u64,
    /// Battery percentage below which a warning is raised.
    pub low_battery_percent: u8,
    /// CPU temperature (°C) above which a warning is raised.
    pub high_temp_celsius: f32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            low_battery_percent: 20,
            high_temp_celsius: 75.0,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use vision_controller::config::{AppConfig, AppPaths};
///
/// let path = AppPaths::new().settings_file;
///
/// // Returns Default when the file is missing
/// let mut config = AppConfig::load_from(&path).unwrap();
/// config.trigger.enabled = false;
/// config.save_to(&path).unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub trigger: TriggerConfig,
    pub playback: PlaybackConfig,
    pub notifications: NotificationConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from `path`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reject values the running controller cannot act on.
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
