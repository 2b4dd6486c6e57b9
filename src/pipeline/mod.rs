//! Pipeline orchestrator module.
//!
//! Wires recognition, the spoken announcement, per-word voice rotation and
//! the background noise mixer into one loop, and exposes the run state the
//! front end labels its controls with.
//!
//! # Architecture
//!
//! ```text
//! front end trigger ──▶ Orchestrator::{start_listening, upload_file, submit_text}
//!                              │  (TaskTracker background task)
//!                              ▼
//!                 RecognitionSource ──▶ Utterance
//!                              │
//!                              ▼
//!        speak_utterance: announce → NoiseMixer::start → words → stop
//!                              │
//!                              ▼
//!                    Observer::{on_text_update, on_error}
//!
//! RunState (atomic) ◀── start / stop / toggle, read by the listening loop
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use polyvoice::audio::RodioPlayback;
//! use polyvoice::config::AppConfig;
//! use polyvoice::pipeline::{Collaborators, LogObserver, Orchestrator};
//! use polyvoice::stt::{HttpTranscriber, SpeechRecognizer};
//! use polyvoice::tts::{EspeakSynthesizer, SynthesisEngine};
//! use polyvoice::voice::VoiceRotation;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::default();
//! let shutdown = CancellationToken::new();
//! let synth = Arc::new(EspeakSynthesizer::from_config(&config.synthesis));
//! let rotation = VoiceRotation::new(synth.voices()?)?;
//! let recognizer = SpeechRecognizer::new(
//!     config.listen.clone(),
//!     Arc::new(HttpTranscriber::from_config(&config.recognition)),
//!     shutdown.clone(),
//! );
//!
//! let orchestrator = Orchestrator::new(
//!     Collaborators {
//!         recognizer: Arc::new(recognizer),
//!         synthesizer: synth,
//!         playback: Arc::new(RodioPlayback::new()),
//!         observer: Arc::new(LogObserver),
//!     },
//!     rotation,
//!     config.noise.clone(),
//!     shutdown,
//! );
//! orchestrator.submit_text("hello there");
//! orchestrator.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod observer;
pub mod runner;
pub mod state;
pub mod utterance;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use observer::{LogObserver, Observer};
pub use runner::{Collaborators, Orchestrator, PipelineError, UtteranceReport};
pub use state::{PipelineRunState, RunState, StartOutcome};
pub use utterance::Utterance;
