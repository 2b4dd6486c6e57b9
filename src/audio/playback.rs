//! Blocking playback of [`DecodedAudio`] through `rodio`.
//!
//! [`PlaybackDevice`] is the seam the pipeline plays through.  Both the
//! foreground speech and the noise mixer call [`PlaybackDevice::play`] at the
//! same time from different threads, so implementations must allow
//! concurrent, independent streams.
//!
//! [`RodioPlayback`] opens a fresh output stream per call; the OS mixer layers
//! simultaneous streams on the default device.

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use thiserror::Error;

use super::clip::DecodedAudio;

/// Errors raised by a playback device.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio output unavailable: {0}")]
    Device(String),

    #[error("cannot play an empty buffer")]
    Empty,
}

impl From<rodio::StreamError> for PlaybackError {
    fn from(e: rodio::StreamError) -> Self {
        PlaybackError::Device(e.to_string())
    }
}

impl From<rodio::PlayError> for PlaybackError {
    fn from(e: rodio::PlayError) -> Self {
        PlaybackError::Device(e.to_string())
    }
}

/// Renders a decoded buffer to the output device.
///
/// `play` blocks until the buffer has finished rendering.  Implementations
/// must be `Send + Sync` and support at least two concurrent callers.
pub trait PlaybackDevice: Send + Sync {
    fn play(&self, audio: &DecodedAudio) -> Result<(), PlaybackError>;
}

/// Default-device playback backed by `rodio`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioPlayback;

impl RodioPlayback {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackDevice for RodioPlayback {
    fn play(&self, audio: &DecodedAudio) -> Result<(), PlaybackError> {
        if audio.is_empty() {
            return Err(PlaybackError::Empty);
        }

        // The stream must outlive the sink; both are dropped once playback ends.
        let (_stream, handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&handle)?;
        sink.append(SamplesBuffer::new(
            audio.channels,
            audio.sample_rate,
            audio.samples.clone(),
        ));
        sink.sleep_until_end();
        Ok(())
    }
}
