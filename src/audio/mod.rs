//! Audio plumbing: decoded buffers, microphone capture, utterance detection
//! and playback.
//!
//! # Data flow
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix → resample_linear
//!           → UtteranceDetector → DecodedAudio (16 kHz mono) → recognizer
//!
//! synthesizer / noise clip / file → DecodedAudio → PlaybackDevice (rodio)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use polyvoice::audio::{DecodedAudio, PlaybackDevice, RodioPlayback};
//!
//! let clip = DecodedAudio::open("rain.wav").unwrap().gain_db(-8.0).fade_in(10).fade_out(10);
//! RodioPlayback::new().play(&clip).unwrap(); // blocks until the clip ends
//! ```

pub mod capture;
pub mod clip;
pub mod playback;
pub mod resample;
pub mod vad;

pub use capture::{AudioCapture, AudioChunk, CaptureError, MicListener, StreamHandle};
pub use clip::{ms_to_frames, AudioError, DecodedAudio, RECOGNITION_SAMPLE_RATE};
pub use playback::{PlaybackDevice, PlaybackError, RodioPlayback};
pub use resample::{downmix, resample_linear};
pub use vad::{UtteranceDetector, VadDetector};

/// File extensions the decoder accepts for noise clips, uploads and the
/// segmenter.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3"];

/// `true` when `path` has a `.wav` / `.mp3` extension (case-insensitive).
pub fn is_audio_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.iter().any(|ok| e.eq_ignore_ascii_case(ok)))
}

/// Audio files directly inside `dir`, sorted by path.  Subdirectories and
/// other extensions are skipped.
pub fn list_audio_files(dir: &std::path::Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_audio_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn recognises_audio_extensions() {
        assert!(is_audio_file(Path::new("a/b/rain.wav")));
        assert!(is_audio_file(Path::new("street.MP3")));
        assert!(!is_audio_file(Path::new("notes.txt")));
        assert!(!is_audio_file(Path::new("wav")));
    }

    #[test]
    fn lists_only_audio_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.wav", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let files = list_audio_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.mp3"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(list_audio_files(Path::new("/nonexistent/polyvoice")).is_err());
    }
}
