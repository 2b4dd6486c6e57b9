//! [`RecognitionSource`]: where utterances come from.
//!
//! [`SpeechRecognizer`] pairs the microphone listener with a [`Transcriber`]:
//! `listen` blocks (on the blocking pool) until one utterance has been
//! spoken, `transcribe_file` decodes an uploaded file instead.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::engine::{RecognitionError, Transcriber};
use crate::audio::{DecodedAudio, MicListener};
use crate::config::ListenConfig;
use crate::pipeline::Utterance;

/// Async source of utterances.
#[async_trait]
pub trait RecognitionSource: Send + Sync {
    /// Wait for the next utterance on the live input.
    async fn listen(&self) -> Result<Utterance, RecognitionError>;

    /// Recognize a single audio file.
    async fn transcribe_file(&self, path: &Path) -> Result<Utterance, RecognitionError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RecognitionSource>) {}
};

/// Microphone + file recognizer over any [`Transcriber`].
pub struct SpeechRecognizer {
    listener: MicListener,
    transcriber: Arc<dyn Transcriber>,
    shutdown: CancellationToken,
}

impl SpeechRecognizer {
    /// `shutdown` aborts a pending `listen` (checked every 100 ms).
    pub fn new(
        listen: ListenConfig,
        transcriber: Arc<dyn Transcriber>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            listener: MicListener::new(listen),
            transcriber,
            shutdown,
        }
    }

    async fn recognize(&self, audio: &DecodedAudio) -> Result<Utterance, RecognitionError> {
        let text = self.transcriber.transcribe(audio).await?;
        Utterance::from_text(&text).ok_or(RecognitionError::Unintelligible)
    }
}

#[async_trait]
impl RecognitionSource for SpeechRecognizer {
    async fn listen(&self) -> Result<Utterance, RecognitionError> {
        let listener = self.listener.clone();
        let shutdown = self.shutdown.clone();
        let audio = tokio::task::spawn_blocking(move || listener.capture_utterance(&shutdown))
            .await
            .map_err(|e| RecognitionError::Capture(format!("listen task failed: {e}")))??;

        log::debug!("stt: captured {} ms of speech", audio.duration_ms());
        self.recognize(&audio).await
    }

    async fn transcribe_file(&self, path: &Path) -> Result<Utterance, RecognitionError> {
        let owned = path.to_path_buf();
        let audio = tokio::task::spawn_blocking(move || DecodedAudio::open(owned))
            .await
            .map_err(|e| RecognitionError::Audio(format!("decode task failed: {e}")))??;

        log::debug!(
            "stt: decoded {} ({} ms)",
            path.display(),
            audio.duration_ms()
        );
        self.recognize(&audio).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
