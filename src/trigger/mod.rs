//! Physical push-button trigger.
//!
//! # Design
//!
//! The button is read by polling: [`watch`] samples a [`TriggerInput`] every
//! `poll_interval_ms` on the runtime and calls `on_press` when it reads
//! active, then sleeps `debounce_ms` so one press starts one workflow.
//! [`SysfsTrigger`] is the Raspberry Pi implementation; hosts without GPIO
//! simply fail to open it and the controller runs without a button.
//!
//! # Usage
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use vision_controller::config::TriggerConfig;
//! use vision_controller::trigger::{watch, SysfsTrigger};
//!
//! # async fn example() -> std::io::Result<()> {
//! let config = TriggerConfig::default();
//! let button = SysfsTrigger::open(config.gpio_pin, config.active_low)?;
//! watch(&button, &config, CancellationToken::new(), || println!("pressed")).await;
//! # Ok(())
//! # }
//! ```

use std::io;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::TriggerConfig;

pub mod sysfs;

pub use sysfs::SysfsTrigger;

// ---------------------------------------------------------------------------
// TriggerInput
// ---------------------------------------------------------------------------

/// A digital input that reads "pressed" or not.
pub trait TriggerInput: Send + Sync {
    /// `true` while the button is held, after active-low inversion.
    fn is_active(&self) -> io::Result<bool>;
}

// ---------------------------------------------------------------------------
// watch
// ---------------------------------------------------------------------------

/// Poll `input` until `shutdown` fires, calling `on_press` for each press.
///
/// Read errors are logged once per streak and polling continues.
pub async fn watch(
    input: &dyn TriggerInput,
    config: &TriggerConfig,
    shutdown: CancellationToken,
    mut on_press: impl FnMut(),
) {
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failing = false;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match input.is_active() {
            Ok(true) => {
                failing = false;
                log::info!("trigger: button pressed");
                on_press();

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(config.debounce()) => {}
                }
                ticker.reset();
            }
            Ok(false) => failing = false,
            Err(e) => {
                if !failing {
                    log::warn!("trigger: read failed: {e}");
                }
                failing = true;
            }
        }
    }

    log::info!("trigger: watcher stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
