//! GPIO input through the legacy sysfs interface.
//!
//! The pin is exported and switched to input on open; each read is a small
//! file read of `gpio<N>/value`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::TriggerInput;

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

pub struct SysfsTrigger {
    value_path: PathBuf,
    active_low: bool,
}

impl SysfsTrigger {
    /// Open `pin` under `/sys/class/gpio`.
    pub fn open(pin: u32, active_low: bool) -> io::Result<Self> {
        Self::open_at(Path::new(SYSFS_GPIO_ROOT), pin, active_low)
    }

    /// Open `pin` under an arbitrary sysfs-style root.
    pub fn open_at(root: &Path, pin: u32, active_low: bool) -> io::Result<Self> {
        let pin_dir = root.join(format!("gpio{pin}"));

        if !pin_dir.exists() {
            fs::write(root.join("export"), pin.to_string())?;
        }
        // Not every kernel lets us set the direction; the value is still readable.
        if let Err(e) = fs::write(pin_dir.join("direction"), "in") {
            log::debug!("trigger: could not set gpio{pin} direction: {e}");
        }

        let trigger = Self {
            value_path: pin_dir.join("value"),
            active_low,
        };
        trigger.is_active()?;

        log::info!(
            "trigger: gpio{pin} ready (active_{})",
            if active_low { "low" } else { "high" }
        );
        Ok(trigger)
    }
}

impl TriggerInput for SysfsTrigger {
    fn is_active(&self) -> io::Result<bool> {
        let raw = fs::read_to_string(&self.value_path)?;
        let high = match raw.trim() {
            "1" => true,
            "0" => false,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected gpio value {other:?}"),
                ))
            }
        };
        Ok(high != self.active_low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_pin(root: &TempDir, pin: u32, value: &str) -> PathBuf {
        let dir = root.path().join(format!("gpio{pin}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("value"), value).unwrap();
        dir
    }

    #[test]
    fn active_low_inverts_reading() {
        let root = TempDir::new().unwrap();
        let dir = fake_pin(&root, 17, "1\n");

        let button = SysfsTrigger::open_at(root.path(), 17, true).unwrap();
        assert!(!button.is_active().unwrap());

        fs::write(dir.join("value"), "0\n").unwrap();
        assert!(button.is_active().unwrap());
    }

    #[test]
    fn active_high_reads_directly() {
        let root = TempDir::new().unwrap();
        fake_pin(&root, 4, "1");

        let button = SysfsTrigger::open_at(root.path(), 4, false).unwrap();
        assert!(button.is_active().unwrap());
    }

    #[test]
    fn open_sets_direction_to_input() {
        let root = TempDir::new().unwrap();
        let dir = fake_pin(&root, 17, "1");

        SysfsTrigger::open_at(root.path(), 17, true).unwrap();
        assert_eq!(fs::read_to_string(dir.join("direction")).unwrap(), "in");
    }

    #[test]
    fn missing_gpio_fails_to_open() {
        let root = TempDir::new().unwrap();
        // `export` is written but the kernel never creates gpio17/.
        assert!(SysfsTrigger::open_at(root.path(), 17, true).is_err());
        assert_eq!(
            fs::read_to_string(root.path().join("export")).unwrap(),
            "17"
        );
    }

    #[test]
    fn garbage_value_is_an_error() {
        let root = TempDir::new().unwrap();
        let dir = fake_pin(&root, 17, "1");
        let button = SysfsTrigger::open_at(root.path(), 17, true).unwrap();

        fs::write(dir.join("value"), "x").unwrap();
        assert!(button.is_active().is_err());
    }
}
