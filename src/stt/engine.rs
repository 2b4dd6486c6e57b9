//! Core transcription trait and the recognition error taxonomy.
//!
//! [`Transcriber`] is the narrow "audio in, text out" seam.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn Transcriber>`.  [`RecognitionSource`](super::RecognitionSource)
//! sits on top of it and deals in utterances.
//!
//! [`MockTranscriber`] (available under `#[cfg(test)]`) returns a
//! pre-configured response without touching the network or a model file.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::{AudioError, CaptureError, DecodedAudio};

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// All errors that can arise while acquiring an utterance.
///
/// None of these are fatal to the pipeline; the acquisition step is simply
/// attempted again.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The audio was processed but contained no recognizable words.
    #[error("could not understand the audio")]
    Unintelligible,

    /// The recognizer could not be reached, or it answered with an error.
    #[error("recognizer unavailable: {0}")]
    Transport(String),

    /// The microphone could not be opened or stopped delivering audio.
    #[error("microphone capture failed: {0}")]
    Capture(String),

    /// The input file could not be read or decoded.
    #[error("unreadable audio: {0}")]
    Audio(String),

    /// Listening was abandoned because the application is shutting down.
    #[error("recognition cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for RecognitionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RecognitionError::Transport("request timed out".into())
        } else {
            RecognitionError::Transport(e.to_string())
        }
    }
}

impl From<AudioError> for RecognitionError {
    fn from(e: AudioError) -> Self {
        RecognitionError::Audio(e.to_string())
    }
}

impl From<CaptureError> for RecognitionError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Cancelled => RecognitionError::Cancelled,
            other => RecognitionError::Capture(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Async, object-safe interface for speech-to-text backends.
///
/// # Contract
///
/// - `audio` may have any rate and channel count; backends convert as needed.
/// - Returns the trimmed transcript.  A transcript with no words is reported
///   as [`RecognitionError::Unintelligible`], never as `Ok("")`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &DecodedAudio) -> Result<String, RecognitionError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

/// Normalize a backend transcript: trim, and map "nothing heard" to
/// [`RecognitionError::Unintelligible`].
pub fn non_empty_transcript(raw: &str) -> Result<String, RecognitionError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(RecognitionError::Unintelligible);
    }
    Ok(text.to_string())
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, RecognitionError>,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    pub fn err(error: RecognitionError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &DecodedAudio) -> Result<String, RecognitionError> {
        if audio.is_empty() {
            return Err(RecognitionError::Unintelligible);
        }
        let text = self.response.clone()?;
        non_empty_transcript(&text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn one_second() -> DecodedAudio {
        DecodedAudio::silence(1_000, 16_000, 1)
    }

    #[tokio::test]
    async fn mock_ok_returns_trimmed_text() {
        let t = MockTranscriber::ok("  hello world \n");
        assert_eq!(t.transcribe(&one_second()).await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn blank_transcript_is_unintelligible() {
        let t = MockTranscriber::ok("   ");
        assert!(matches!(
            t.transcribe(&one_second()).await,
            Err(RecognitionError::Unintelligible)
        ));
    }

    #[tokio::test]
    async fn mock_err_returns_configured_error() {
        let t = MockTranscriber::err(RecognitionError::Transport("down".into()));
        assert!(matches!(
            t.transcribe(&one_second()).await,
            Err(RecognitionError::Transport(_))
        ));
    }

    #[test]
    fn cancelled_capture_maps_to_cancelled() {
        let e: RecognitionError = CaptureError::Cancelled.into();
        assert!(matches!(e, RecognitionError::Cancelled));
        let e: RecognitionError = CaptureError::NoDevice.into();
        assert!(matches!(e, RecognitionError::Capture(_)));
    }

    #[test]
    fn audio_error_maps_to_audio() {
        let e: RecognitionError = AudioError::Decode("bad header".into()).into();
        assert!(e.to_string().contains("bad header"));
    }

    #[test]
    fn box_dyn_transcriber_compiles() {
        let _t: Box<dyn Transcriber> = Box::new(MockTranscriber::ok("ok"));
    }
}
