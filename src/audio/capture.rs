//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.  Call
//! [`AudioCapture::start`] to begin streaming [`AudioChunk`]s over an mpsc
//! channel.  The returned [`StreamHandle`] is a RAII guard: dropping it
//! stops the underlying cpal stream.
//!
//! [`MicListener`] builds on top of it: one call opens the default input,
//! waits for a complete utterance and closes the stream again.

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::clip::{DecodedAudio, RECOGNITION_SAMPLE_RATE};
use super::resample::{downmix, resample_linear};
use super::vad::UtteranceDetector;
use crate::config::ListenConfig;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

/// RAII guard that keeps the cpal stream alive.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("input stream closed unexpectedly")]
    StreamClosed,

    #[error("listening was cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Create a new [`AudioCapture`] using the system default input device.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start recording and send [`AudioChunk`]s to `tx`.
    ///
    /// Send errors (receiver dropped) are ignored so the audio thread never
    /// panics.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                });
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// MicListener
// ---------------------------------------------------------------------------

/// Blocking "wait for the next utterance" on the default microphone.
#[derive(Debug, Clone)]
pub struct MicListener {
    config: ListenConfig,
}

impl MicListener {
    pub fn new(config: ListenConfig) -> Self {
        Self { config }
    }

    /// Open the microphone and block until one utterance has been spoken.
    ///
    /// Returns 16 kHz mono audio.  There is no timeout; the only way out
    /// without speech is cancelling `shutdown`, which is checked every
    /// 100 ms.  Must run on a blocking thread.
    pub fn capture_utterance(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<DecodedAudio, CaptureError> {
        let capture = AudioCapture::new()?;
        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let _handle = capture.start(tx)?;
        log::debug!(
            "mic: listening ({} Hz, {} ch)",
            capture.sample_rate(),
            capture.channels()
        );

        let mut detector = UtteranceDetector::new(&self.config, RECOGNITION_SAMPLE_RATE);

        loop {
            if shutdown.is_cancelled() {
                return Err(CaptureError::Cancelled);
            }
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(chunk) => {
                    let mono = downmix(&chunk.samples, chunk.channels);
                    let resampled =
                        resample_linear(&mono, chunk.sample_rate, RECOGNITION_SAMPLE_RATE);
                    if let Some(samples) = detector.push(&resampled) {
                        return Ok(DecodedAudio::new(samples, RECOGNITION_SAMPLE_RATE, 1));
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(CaptureError::StreamClosed),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn mic_listener_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MicListener>();
    }

    #[test]
    fn capture_error_messages() {
        assert!(CaptureError::NoDevice.to_string().contains("no input device"));
        assert!(CaptureError::Cancelled.to_string().contains("cancelled"));
    }
}
