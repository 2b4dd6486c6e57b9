//! Where polyvoice keeps its files.
//!
//! Only two things live outside the working directory: `settings.toml`
//! (recognizer/synthesizer endpoints, the voice list, noise and segmenter
//! defaults) in the platform config dir, and GGML Whisper models for the
//! optional local recognizer in `<data dir>/polyvoice/models/`.  Noise
//! folders, uploads and segmenter input/output are always paths the user
//! names explicitly.
//!
//! On Linux that is `~/.config/polyvoice/` and
//! `~/.local/share/polyvoice/models/`; macOS and Windows use their
//! equivalents via `dirs`.

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for local Whisper GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "polyvoice";

    /// Resolve against the platform dirs, or `./polyvoice/` when the
    /// platform has none.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            models_dir,
        }
    }

    /// Full path of a Whisper model given its file stem.
    pub fn model_file(&self, stem: &str) -> PathBuf {
        self.models_dir.join(format!("{stem}.bin"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
