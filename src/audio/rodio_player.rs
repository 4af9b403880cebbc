//! `rodio`-backed [`AudioOutput`].
//!
//! # Design
//!
//! `rodio::OutputStream` is not `Send`, so it lives on a **dedicated OS
//! thread** that only keeps it alive.  The thread hands the (shareable)
//! `OutputStreamHandle` back and then blocks until the player is dropped.
//! Each call to [`play`](AudioOutput::play) creates a fresh `Sink`, so a
//! stopped sink is never reused.

use std::io::Cursor;
use std::sync::mpsc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use super::player::{AudioOutput, PlayerError};

pub struct RodioPlayer {
    handle: OutputStreamHandle,
    sink: Mutex<Option<Sink>>,
    /// Dropping this sender releases the output thread.
    _keepalive: mpsc::Sender<()>,
}

impl RodioPlayer {
    /// Open the default output device.
    pub fn open() -> Result<Self, PlayerError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (keepalive_tx, keepalive_rx) = mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Returns once every sender is gone.
                    let _ = keepalive_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(PlayerError::Device(e.to_string())));
                }
            })
            .map_err(|e| PlayerError::Device(e.to_string()))?;

        let handle = ready_rx
            .recv()
            .map_err(|e| PlayerError::Device(e.to_string()))??;

        log::info!("audio: output device opened");
        Ok(Self {
            handle,
            sink: Mutex::new(None),
            _keepalive: keepalive_tx,
        })
    }
}

impl AudioOutput for RodioPlayer {
    fn play(&self, audio: Bytes) -> Result<(), PlayerError> {
        let source =
            Decoder::new(Cursor::new(audio)).map_err(|e| PlayerError::Decode(e.to_string()))?;
        let sink = Sink::try_new(&self.handle).map_err(|e| PlayerError::Device(e.to_string()))?;
        sink.append(source);

        if let Some(previous) = self.sink.lock().replace(sink) {
            previous.stop();
        }
        Ok(())
    }

    fn pause(&self) {
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.pause();
        }
    }

    fn resume(&self) {
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.play();
        }
    }

    fn stop(&self) {
        if let Some(sink) = self.sink.lock().take() {
            sink.stop();
        }
    }

    fn seek(&self, offset_secs: f64) -> Result<(), PlayerError> {
        let guard = self.sink.lock();
        let Some(sink) = guard.as_ref() else {
            return Ok(());
        };

        let target = seek_target(sink.get_pos(), offset_secs)?;
        sink.try_seek(target)
            .map_err(|e| PlayerError::Seek(format!("{e:?}")))
    }

    fn is_busy(&self) -> bool {
        self.sink
            .lock()
            .as_ref()
            .is_some_and(|sink| !sink.empty())
    }
}

/// `position` moved by `offset_secs`, clamped at the start of the track.
fn seek_target(position: Duration, offset_secs: f64) -> Result<Duration, PlayerError> {
    let delta = Duration::try_from_secs_f64(offset_secs.abs())
        .map_err(|e| PlayerError::Seek(format!("offset {offset_secs}: {e}")))?;
    if offset_secs >= 0.0 {
        position
            .checked_add(delta)
            .ok_or_else(|| PlayerError::Seek(format!("offset {offset_secs} out of range")))
    } else {
        Ok(position.saturating_sub(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_target_moves_and_clamps() {
        let pos = Duration::from_secs(30);
        assert_eq!(seek_target(pos, 10.0).unwrap(), Duration::from_secs(40));
        assert_eq!(seek_target(pos, -10.0).unwrap(), Duration::from_secs(20));
        assert_eq!(seek_target(pos, -100.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn huge_or_non_finite_offsets_are_errors() {
        let pos = Duration::from_secs(30);
        assert!(matches!(seek_target(pos, 1e300), Err(PlayerError::Seek(_))));
        assert!(matches!(seek_target(pos, f64::NAN), Err(PlayerError::Seek(_))));
        assert!(matches!(seek_target(pos, f64::INFINITY), Err(PlayerError::Seek(_))));
    }
}
