//! Local recognition through `whisper-rs` (feature `whisper`).
//!
//! The GGML model is loaded once; a fresh `WhisperState` is created for every
//! call so the transcriber can be shared without locking.  Inference is CPU
//! bound and runs on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::engine::{non_empty_transcript, RecognitionError, Transcriber};
use crate::audio::{DecodedAudio, RECOGNITION_SAMPLE_RATE};

/// Whisper refuses anything shorter than one second of input; pad to it.
const MIN_SAMPLES: usize = RECOGNITION_SAMPLE_RATE as usize;

struct WhisperModel {
    ctx: WhisperContext,
    language: String,
    n_threads: i32,
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading.
unsafe impl Send for WhisperModel {}
unsafe impl Sync for WhisperModel {}

impl WhisperModel {
    fn run(&self, audio: &[f32]) -> Result<String, RecognitionError> {
        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        let lang: Option<&str> = if self.language == "auto" {
            None
        } else {
            Some(self.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;
        state
            .full(fp, audio)
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let seg = state
                .full_get_segment_text(i)
                .map_err(|e| RecognitionError::Transport(format!("segment {i}: {e}")))?;
            text.push_str(&seg);
        }
        Ok(text)
    }
}

/// [`Transcriber`] backed by a local GGML Whisper model.
#[derive(Clone)]
pub struct WhisperTranscriber {
    model: Arc<WhisperModel>,
}

impl WhisperTranscriber {
    /// Load the model at `model_path`.
    pub fn load(model_path: impl AsRef<Path>, language: &str) -> Result<Self, RecognitionError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(RecognitionError::Transport(format!(
                "model not found: {}",
                path.display()
            )));
        }
        let path_str = path.to_str().ok_or_else(|| {
            RecognitionError::Transport(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let n_threads = std::thread::available_parallelism()
            .map(|n| n.get().min(8) as i32)
            .unwrap_or(4);

        log::info!("stt: loaded whisper model {}", path.display());
        Ok(Self {
            model: Arc::new(WhisperModel {
                ctx,
                language: language.to_string(),
                n_threads,
            }),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &DecodedAudio) -> Result<String, RecognitionError> {
        if audio.is_empty() {
            return Err(RecognitionError::Unintelligible);
        }
        let mut samples = audio.to_mono_16k();
        if samples.len() < MIN_SAMPLES {
            samples.resize(MIN_SAMPLES, 0.0);
        }

        let model = Arc::clone(&self.model);
        let text = tokio::task::spawn_blocking(move || model.run(&samples))
            .await
            .map_err(|e| RecognitionError::Transport(format!("whisper task failed: {e}")))??;

        non_empty_transcript(&text)
    }
}
