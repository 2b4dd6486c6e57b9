//! OpenAI-compatible `/v1/audio/speech` adapter.
//!
//! [`SynthesisEngine`] is a blocking interface, so the request is driven on
//! the runtime handle captured at construction.  `speak` must therefore be
//! called from a blocking thread (`spawn_blocking`), never from a worker.

use std::time::Duration;

use tokio::runtime::Handle;

use super::{SynthesisEngine, SynthesisError, VoiceHandle};
use crate::audio::DecodedAudio;
use crate::config::SynthesisConfig;

/// Voices every OpenAI-compatible speech endpoint is expected to know.
pub const DEFAULT_HTTP_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

pub struct HttpSynthesizer {
    client: reqwest::Client,
    runtime: Handle,
    config: SynthesisConfig,
}

impl HttpSynthesizer {
    /// Build from config.  Panics outside a tokio runtime.
    pub fn from_config(config: &SynthesisConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            runtime: Handle::current(),
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch(&self, text: &str, voice: &VoiceHandle) -> Result<Vec<u8>, SynthesisError> {
        let body = serde_json::json!({
            "model":           self.config.model,
            "input":           text,
            "voice":           voice.id(),
            "response_format": "wav"
        });

        let mut req = self.client.post(self.endpoint()).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Engine(format!("HTTP {status}: {detail}")));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl SynthesisEngine for HttpSynthesizer {
    fn speak(&self, text: &str, voice: &VoiceHandle) -> Result<DecodedAudio, SynthesisError> {
        let bytes = self.runtime.block_on(self.fetch(text, voice))?;
        if bytes.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        let audio = DecodedAudio::decode(bytes)?;
        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        Ok(audio)
    }

    fn voices(&self) -> Result<Vec<VoiceHandle>, SynthesisError> {
        Ok(DEFAULT_HTTP_VOICES.iter().copied().map(VoiceHandle::new).collect())
    }
}
