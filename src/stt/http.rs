//! `HttpTranscriber`: OpenAI-compatible `/v1/audio/transcriptions` client.
//!
//! Works with OpenAI, Groq, faster-whisper-server, LocalAI and anything else
//! that accepts the multipart transcription request.  All connection details
//! come from [`RecognitionConfig`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::engine::{non_empty_transcript, RecognitionError, Transcriber};
use crate::audio::{DecodedAudio, RECOGNITION_SAMPLE_RATE};
use crate::config::RecognitionConfig;

pub struct HttpTranscriber {
    client: reqwest::Client,
    config: RecognitionConfig,
}

impl HttpTranscriber {
    /// Build from config.  The per-request timeout comes from
    /// `config.timeout_secs`.
    pub fn from_config(config: &RecognitionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn form(&self, wav: Vec<u8>) -> Result<Form, RecognitionError> {
        let file = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part("file", file);

        if self.config.language != "auto" {
            form = form.text("language", self.config.language.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    /// Upload `audio` as a 16 kHz mono WAV and return the transcript.
    ///
    /// The `Authorization: Bearer …` header is attached only when
    /// `config.api_key` is a non-empty string.
    async fn transcribe(&self, audio: &DecodedAudio) -> Result<String, RecognitionError> {
        if audio.is_empty() {
            return Err(RecognitionError::Unintelligible);
        }

        let mono = DecodedAudio::new(audio.to_mono_16k(), RECOGNITION_SAMPLE_RATE, 1);
        let wav = mono.to_wav_bytes()?;

        let mut req = self.client.post(self.endpoint()).multipart(self.form(wav)?);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Transport(format!("HTTP {status}: {detail}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RecognitionError::Transport(format!("bad response: {e}")))?;

        let text = json["text"].as_str().unwrap_or("");
        log::debug!("stt: http transcript {:?}", text);
        non_empty_transcript(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
