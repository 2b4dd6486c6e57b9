//! STT (Speech-to-Text) module.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │              RecognitionSource (trait)                    │
//! │                                                           │
//! │   ┌──────────────┐         ┌──────────────────────────┐   │
//! │   │ MicListener  │──audio─▶│  Transcriber (trait)     │   │
//! │   │ / file decode│         │  - HttpTranscriber       │   │
//! │   └──────────────┘         │  - WhisperTranscriber    │   │
//! │                            └────────────┬─────────────┘   │
//! │                                         ▼                 │
//! │                                    Utterance              │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod http;
pub mod recognizer;
#[cfg(feature = "whisper")]
pub mod whisper;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{non_empty_transcript, RecognitionError, Transcriber};
pub use http::HttpTranscriber;
pub use recognizer::{RecognitionSource, SpeechRecognizer};
#[cfg(feature = "whisper")]
pub use whisper::WhisperTranscriber;

#[cfg(test)]
pub use engine::MockTranscriber;

use std::sync::Arc;

use crate::config::{AppPaths, RecognitionBackend, RecognitionConfig};

/// Build the configured transcription backend.
pub fn build_transcriber(
    config: &RecognitionConfig,
    paths: &AppPaths,
) -> anyhow::Result<Arc<dyn Transcriber>> {
    match config.backend {
        RecognitionBackend::Http => Ok(Arc::new(HttpTranscriber::from_config(config))),
        #[cfg(feature = "whisper")]
        RecognitionBackend::Whisper => {
            let model = paths.model_file(&config.whisper_model);
            Ok(Arc::new(WhisperTranscriber::load(model, &config.language)?))
        }
        #[cfg(not(feature = "whisper"))]
        RecognitionBackend::Whisper => {
            let _ = paths;
            anyhow::bail!("whisper backend selected but polyvoice was built without the `whisper` feature")
        }
    }
}
