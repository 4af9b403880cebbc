//! Speech playback.
//!
//! # Engines
//!
//! ```text
//! feature "playback" on  → RodioPlayer  (default output device)
//! feature off / no device → SilentPlayer (completes immediately)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vision_controller::audio::{open_default_output, AudioOutput};
//!
//! let player: Arc<dyn AudioOutput> = open_default_output();
//! // player.play(mp3_bytes)?; then poll player.is_busy()
//! ```

use std::sync::Arc;

pub mod player;
#[cfg(feature = "playback")]
pub mod rodio_player;

pub use player::{AudioOutput, PlayerError, SilentPlayer};
#[cfg(feature = "playback")]
pub use rodio_player::RodioPlayer;

#[cfg(test)]
pub use player::MockPlayer;

/// The best available engine: the real device when compiled in and present,
/// otherwise [`SilentPlayer`].
pub fn open_default_output() -> Arc<dyn AudioOutput> {
    #[cfg(feature = "playback")]
    {
        match RodioPlayer::open() {
            Ok(player) => return Arc::new(player),
            Err(e) => log::warn!("audio: {e}; speech playback disabled"),
        }
    }
    #[cfg(not(feature = "playback"))]
    log::warn!("audio: built without the `playback` feature; speech playback disabled");

    Arc::new(SilentPlayer)
}
