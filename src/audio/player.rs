//! Playback engine abstraction.
//!
//! [`AudioOutput`] is the interface the workflow controller drives.  Every
//! method is synchronous and returns quickly; the controller polls
//! [`is_busy`](AudioOutput::is_busy) from its own task to observe natural
//! completion.

use bytes::Bytes;
use thiserror::Error;

// ---------------------------------------------------------------------------
// PlayerError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    /// No output device could be opened.
    #[error("audio device unavailable: {0}")]
    Device(String),

    /// The payload could not be decoded.
    #[error("could not decode audio: {0}")]
    Decode(String),

    /// The engine refused the requested position.
    #[error("seek failed: {0}")]
    Seek(String),
}

// ---------------------------------------------------------------------------
// AudioOutput trait
// ---------------------------------------------------------------------------

pub trait AudioOutput: Send + Sync {
    /// Replace whatever is loaded with `audio` and start playing it.
    fn play(&self, audio: Bytes) -> Result<(), PlayerError>;

    fn pause(&self);

    fn resume(&self);

    /// Stop and unload; `is_busy` is `false` afterwards.
    fn stop(&self);

    /// Move the play head by `offset_secs` (negative rewinds), clamped at 0.
    fn seek(&self, offset_secs: f64) -> Result<(), PlayerError>;

    /// `true` while something is loaded and not finished (paused counts).
    fn is_busy(&self) -> bool;
}

// ---------------------------------------------------------------------------
// SilentPlayer
// ---------------------------------------------------------------------------

/// Stand-in used when no playback engine is available: accepts every call
/// and reports idle at once, so a workflow still runs to completion.
#[derive(Debug, Default)]
pub struct SilentPlayer;

impl AudioOutput for SilentPlayer {
    fn play(&self, audio: Bytes) -> Result<(), PlayerError> {
        log::info!(
            "audio: no playback engine, skipping {} bytes of speech",
            audio.len()
        );
        Ok(())
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn stop(&self) {}

    fn seek(&self, _offset_secs: f64) -> Result<(), PlayerError> {
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// MockPlayer  (test double)
// ---------------------------------------------------------------------------

/// Records calls and stays busy until [`finish`](MockPlayer::finish) or
/// `stop` is called, which lets tests decide when playback "ends".
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockPlayer {
    busy: std::sync::atomic::AtomicBool,
    paused: std::sync::atomic::AtomicBool,
    fail_play: std::sync::atomic::AtomicBool,
    plays: std::sync::atomic::AtomicUsize,
    stops: std::sync::atomic::AtomicUsize,
    seeks: parking_lot::Mutex<Vec<f64>>,
}

#[cfg(test)]
impl MockPlayer {
    pub fn finish(&self) {
        self.busy.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_next_play(&self) {
        self.fail_play.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn plays(&self) -> usize {
        self.plays.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().clone()
    }
}

#[cfg(test)]
impl AudioOutput for MockPlayer {
    fn play(&self, _audio: Bytes) -> Result<(), PlayerError> {
        use std::sync::atomic::Ordering;
        if self.fail_play.swap(false, Ordering::SeqCst) {
            return Err(PlayerError::Decode("not an mp3".into()));
        }
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.busy.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    fn stop(&self) {
        use std::sync::atomic::Ordering;
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
    }

    fn seek(&self, offset_secs: f64) -> Result<(), PlayerError> {
        self.seeks.lock().push(offset_secs);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.busy.load(std::sync::atomic::Ordering::SeqCst)
    }
}
