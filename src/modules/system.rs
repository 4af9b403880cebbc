//! `system` module: periodic host telemetry.
//!
//! Every `interval_secs` a [`Telemetry`] sample is read on the blocking pool
//! and published as `{type: "telemetry", data: {system: ...}}`.  Sources:
//!
//! ```text
//! RAM         /proc/meminfo             (MemTotal, MemAvailable)
//! disk        df -kP /
//! CPU temp    /sys/class/thermal/thermal_zone0/temp, else a CPU hwmon sensor
//! battery     /sys/class/power_supply/*/{type,capacity,status}
//! ```
//!
//! Missing sources are reported as `null` rather than failing the sample.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigStore, TelemetryConfig};
use crate::hub::{HubMessage, NotificationLevel, StateHub};

use super::Module;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// hwmon chip names that report the CPU package temperature.
const CPU_SENSORS: &[&str] = &["cpu_thermal", "coretemp", "k10temp"];

// ---------------------------------------------------------------------------
// Telemetry sample
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Usage {
    pub percent: u8,
    /// GiB, one decimal.
    pub total: f64,
    /// GiB, one decimal.
    pub used: f64,
}

impl Usage {
    fn from_kib(total_kib: u64, used_kib: u64) -> Self {
        let percent = if total_kib == 0 {
            0
        } else {
            ((used_kib as f64 / total_kib as f64) * 100.0).round().min(100.0) as u8
        };
        Self {
            percent,
            total: kib_to_gib(total_kib),
            used: kib_to_gib(used_kib),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Battery {
    pub percent: u8,
    pub charging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cpu {
    pub temp: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Telemetry {
    pub battery: Option<Battery>,
    pub ram: Option<Usage>,
    pub disk: Option<Usage>,
    pub cpu: Cpu,
    pub version: &'static str,
}

fn kib_to_gib(kib: u64) -> f64 {
    (kib as f64 / (1024.0 * 1024.0) * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Read one sample from the filesystem rooted at `root` (`/` in production).
pub fn sample(root: &Path) -> Telemetry {
    Telemetry {
        battery: read_battery(root),
        ram: fs::read_to_string(root.join("proc/meminfo"))
            .ok()
            .and_then(|text| parse_meminfo(&text)),
        disk: read_disk(),
        cpu: Cpu {
            temp: read_cpu_temp(root),
        },
        version: VERSION,
    }
}

fn parse_meminfo(text: &str) -> Option<Usage> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find_map(|line| line.strip_prefix(name))?
            .trim_start_matches(':')
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable")?;
    Some(Usage::from_kib(total, total.saturating_sub(available)))
}

fn read_disk() -> Option<Usage> {
    let output = Command::new("df").args(["-kP", "/"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_df(&String::from_utf8_lossy(&output.stdout))
}

/// Parse POSIX `df -kP` output (second line: fs, blocks, used, available, ...).
fn parse_df(text: &str) -> Option<Usage> {
    let mut cols = text.lines().nth(1)?.split_whitespace().skip(1);
    let total: u64 = cols.next()?.parse().ok()?;
    let used: u64 = cols.next()?.parse().ok()?;
    Some(Usage::from_kib(total, used))
}

fn read_cpu_temp(root: &Path) -> Option<f32> {
    let millis = |path: PathBuf| -> Option<f32> {
        let raw: f32 = fs::read_to_string(path).ok()?.trim().parse().ok()?;
        Some((raw / 100.0).round() / 10.0)
    };

    if let Some(temp) = millis(root.join("sys/class/thermal/thermal_zone0/temp")) {
        return Some(temp);
    }

    let hwmon = fs::read_dir(root.join("sys/class/hwmon")).ok()?;
    for entry in hwmon.flatten() {
        let name = fs::read_to_string(entry.path().join("name")).unwrap_or_default();
        if CPU_SENSORS.contains(&name.trim()) {
            if let Some(temp) = millis(entry.path().join("temp1_input")) {
                return Some(temp);
            }
        }
    }
    None
}

fn read_battery(root: &Path) -> Option<Battery> {
    let supplies = fs::read_dir(root.join("sys/class/power_supply")).ok()?;
    for entry in supplies.flatten() {
        let dir = entry.path();
        let read = |file: &str| fs::read_to_string(dir.join(file)).unwrap_or_default();

        if read("type").trim() != "Battery" {
            continue;
        }
        let Ok(percent) = read("capacity").trim().parse::<u8>() else {
            continue;
        };
        return Some(Battery {
            percent: percent.min(100),
            charging: read("status").trim() != "Discharging",
        });
    }
    None
}

// ---------------------------------------------------------------------------
// Alarms
// ---------------------------------------------------------------------------

/// Edge detector for the two warnings: each fires once on entering the
/// alarm condition and re-arms when the condition clears.
#[derive(Debug, Default)]
struct Alarms {
    low_battery: bool,
    high_temp: bool,
}

impl Alarms {
    fn check(&mut self, sample: &Telemetry, config: &TelemetryConfig) -> Vec<&'static str> {
        let mut raised = Vec::new();

        let low = sample
            .battery
            .as_ref()
            .is_some_and(|b| !b.charging && b.percent < config.low_battery_percent);
        if low && !self.low_battery {
            raised.push("Warning: Battery is low!");
        }
        self.low_battery = low;

        let hot = sample.cpu.temp.is_some_and(|t| t > config.high_temp_celsius);
        if hot && !self.high_temp {
            raised.push("Alert: CPU temperature is high!");
        }
        self.high_temp = hot;

        raised
    }
}

// ---------------------------------------------------------------------------
// SystemModule
// ---------------------------------------------------------------------------

pub struct SystemModule {
    hub: Arc<StateHub>,
    config: Arc<ConfigStore>,
    root: PathBuf,
    alarms: Mutex<Alarms>,
}

impl SystemModule {
    pub fn new(hub: Arc<StateHub>, config: Arc<ConfigStore>) -> Self {
        Self::with_root(hub, config, PathBuf::from("/"))
    }

    /// Read `/proc` and `/sys` relative to `root`.
    pub fn with_root(hub: Arc<StateHub>, config: Arc<ConfigStore>, root: PathBuf) -> Self {
        Self {
            hub,
            config,
            root,
            alarms: Mutex::new(Alarms::default()),
        }
    }

    /// Publish `sample` and raise any newly entered alarms.
    fn report(&self, sample: &Telemetry, config: &TelemetryConfig) {
        match serde_json::to_value(sample) {
            Ok(system) => self.hub.publish(&HubMessage::telemetry(json!({ "system": system }))),
            Err(e) => log::error!("system: could not serialise telemetry: {e}"),
        }

        let raised = self.alarms.lock().check(sample, config);
        for message in raised {
            self.hub.notify(message, NotificationLevel::Warning);
        }
    }
}

#[async_trait]
impl Module for SystemModule {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn start(&self, shutdown: CancellationToken) {
        let config = self.config.snapshot().telemetry;
        if !config.enabled {
            log::info!("system: telemetry disabled");
            return;
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let root = self.root.clone();
            match tokio::task::spawn_blocking(move || sample(&root)).await {
                Ok(sample) => self.report(&sample, &config),
                Err(e) => log::warn!("system: telemetry sample failed: {e}"),
            }
        }
        log::info!("system: telemetry stopped");
    }

    fn state(&self) -> Option<Value> {
        Some(json!({ "version": VERSION }))
    }
}
