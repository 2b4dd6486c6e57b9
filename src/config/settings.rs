//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// RecognitionBackend / RecognitionConfig
// ---------------------------------------------------------------------------

/// Selects which engine turns captured audio into text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RecognitionBackend {
    /// Any OpenAI-compatible `/v1/audio/transcriptions` endpoint.
    Http,
    /// In-process Whisper inference (requires the `whisper` feature).
    Whisper,
}

impl Default for RecognitionBackend {
    fn default() -> Self {
        Self::Http
    }
}

/// Settings for the speech-recognition step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Which backend to use.
    pub backend: RecognitionBackend,
    /// Base URL of the transcription API (without `/v1`).
    pub base_url: String,
    /// API key; `None` for local servers that need no authentication.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"whisper-1"`).
    pub model: String,
    /// ISO-639-1 language code, or `"auto"`.
    pub language: String,
    /// Maximum seconds to wait for a transcription response.
    pub timeout_secs: u64,
    /// GGML model file stem for the Whisper backend.
    pub whisper_model: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            backend: RecognitionBackend::default(),
            base_url: "http://localhost:8000".into(),
            api_key: None,
            model: "whisper-1".into(),
            language: "en".into(),
            timeout_secs: 30,
            whisper_model: "ggml-base.en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SynthesisBackend / SynthesisConfig
// ---------------------------------------------------------------------------

/// Selects which engine renders words as speech.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SynthesisBackend {
    /// Local `espeak-ng` (or compatible) command writing WAV files.
    Espeak,
    /// Any OpenAI-compatible `/v1/audio/speech` endpoint.
    Http,
}

impl Default for SynthesisBackend {
    fn default() -> Self {
        Self::Espeak
    }
}

/// Settings for the speech-synthesis step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Which backend to use.
    pub backend: SynthesisBackend,
    /// Executable used by the espeak backend.
    pub espeak_binary: String,
    /// Speaking rate in words per minute (espeak backend).
    pub rate_wpm: u32,
    /// Voices to rotate through.  Empty means "ask the engine".
    pub voices: Vec<String>,
    /// Base URL of the speech API (without `/v1`).
    pub base_url: String,
    /// API key for the speech API.
    pub api_key: Option<String>,
    /// TTS model identifier (e.g. `"tts-1"`).
    pub model: String,
    /// Maximum seconds to wait for one synthesized word.
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backend: SynthesisBackend::default(),
            espeak_binary: "espeak-ng".into(),
            rate_wpm: 160,
            voices: Vec::new(),
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "tts-1".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// ListenConfig
// ---------------------------------------------------------------------------

/// Settings for continuous microphone listening and utterance detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// RMS threshold above which a 30 ms frame counts as speech.
    pub vad_threshold: f32,
    /// Trailing silence that closes an utterance, in milliseconds.
    pub end_silence_ms: u64,
    /// Utterances shorter than this are discarded as noise.
    pub min_utterance_secs: f32,
    /// Utterances are force-closed at this length.
    pub max_utterance_secs: f32,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            vad_threshold: 0.01,
            end_silence_ms: 800,
            min_utterance_secs: 0.5,
            max_utterance_secs: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// NoiseConfig
// ---------------------------------------------------------------------------

/// Background-noise mixing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Folder of `.wav` / `.mp3` clips.  `None` disables noise.
    pub folder: Option<PathBuf>,
    /// How far each clip is turned down, in dB.
    pub attenuation_db: f32,
    /// Fade-in / fade-out length applied to every clip.
    pub fade_ms: u64,
    /// How often an empty or missing folder is re-checked.
    pub poll_interval_ms: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            folder: None,
            attenuation_db: 8.0,
            fade_ms: 10,
            poll_interval_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentConfig
// ---------------------------------------------------------------------------

/// Defaults for the audio segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Chunk length for fixed-size segmentation.
    pub chunk_ms: u64,
    /// Shortest random chunk.
    pub random_min_ms: u64,
    /// Longest random chunk.
    pub random_max_ms: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            chunk_ms: 1000,
            random_min_ms: 500,
            random_max_ms: 3500,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use polyvoice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Speech-recognition settings.
    pub recognition: RecognitionConfig,
    /// Speech-synthesis settings.
    pub synthesis: SynthesisConfig,
    /// Microphone listening settings.
    pub listen: ListenConfig,
    /// Background-noise settings.
    pub noise: NoiseConfig,
    /// Segmenter defaults.
    pub segment: SegmentConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
