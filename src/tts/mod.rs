//! TTS (text-to-speech) module.
//!
//! [`SynthesisEngine`] is the narrow interface the pipeline speaks through:
//! one call turns a word (or a phrase) plus a [`VoiceHandle`] into a fully
//! decoded [`DecodedAudio`] buffer.  Any intermediate files are the adapter's
//! business and never outlive the call.
//!
//! | Adapter | Backend |
//! |---------|---------|
//! | [`EspeakSynthesizer`] | local `espeak-ng` writing a temporary WAV |
//! | [`HttpSynthesizer`]   | OpenAI-compatible `/v1/audio/speech` |

pub mod espeak;
pub mod http;

pub use espeak::EspeakSynthesizer;
pub use http::HttpSynthesizer;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::audio::{AudioError, DecodedAudio};
use crate::config::{SynthesisBackend, SynthesisConfig};

// ---------------------------------------------------------------------------
// VoiceHandle
// ---------------------------------------------------------------------------

/// Opaque identifier of a synthesis voice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceHandle(String);

impl VoiceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The engine-specific identifier.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

/// Errors raised while synthesizing speech.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis engine failed: {0}")]
    Engine(String),

    #[error("synthesis engine produced no audio")]
    EmptyAudio,

    #[error("synthesized audio is unreadable: {0}")]
    Audio(#[from] AudioError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        SynthesisError::Engine(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// SynthesisEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech synthesis.
///
/// # Contract
///
/// - `speak` blocks until the audio is complete and returns a non-empty,
///   decoded buffer.  Callers in async code run it on the blocking pool.
/// - `voices` enumerates the voice set once; the pipeline never asks again.
pub trait SynthesisEngine: Send + Sync {
    fn speak(&self, text: &str, voice: &VoiceHandle) -> Result<DecodedAudio, SynthesisError>;

    fn voices(&self) -> Result<Vec<VoiceHandle>, SynthesisError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SynthesisEngine>) {}
};

/// Build the configured synthesizer.
///
/// Must be called from inside a tokio runtime (the HTTP adapter captures the
/// current runtime handle).
pub fn build_synthesizer(config: &SynthesisConfig) -> Arc<dyn SynthesisEngine> {
    match config.backend {
        SynthesisBackend::Espeak => Arc::new(EspeakSynthesizer::from_config(config)),
        SynthesisBackend::Http => Arc::new(HttpSynthesizer::from_config(config)),
    }
}

/// The voice set to rotate through: the configured list when non-empty,
/// otherwise whatever the engine enumerates.
pub fn resolve_voices(
    engine: &dyn SynthesisEngine,
    config: &SynthesisConfig,
) -> Result<Vec<VoiceHandle>, SynthesisError> {
    if !config.voices.is_empty() {
        return Ok(config.voices.iter().map(VoiceHandle::new).collect());
    }
    engine.voices()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
