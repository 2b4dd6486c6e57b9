//! Local synthesis through the `espeak-ng` command line.
//!
//! Each call writes into a fresh temporary WAV file, waits for the process to
//! exit, reads the file back and decodes it.  The temporary file is removed
//! when the [`tempfile::NamedTempFile`] guard drops, on success and on error.

use std::io::Write;
use std::process::{Command, Stdio};

use super::{SynthesisEngine, SynthesisError, VoiceHandle};
use crate::audio::DecodedAudio;
use crate::config::SynthesisConfig;

/// `espeak-ng` (or any CLI-compatible fork) adapter.
#[derive(Debug, Clone)]
pub struct EspeakSynthesizer {
    binary: String,
    rate_wpm: u32,
}

impl EspeakSynthesizer {
    pub fn new(binary: impl Into<String>, rate_wpm: u32) -> Self {
        Self {
            binary: binary.into(),
            rate_wpm,
        }
    }

    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self::new(config.espeak_binary.clone(), config.rate_wpm)
    }

    fn run(&self, text: &str, voice: &VoiceHandle, wav: &std::path::Path) -> Result<(), SynthesisError> {
        let mut child = Command::new(&self.binary)
            .arg("-v")
            .arg(voice.id())
            .arg("-s")
            .arg(self.rate_wpm.to_string())
            .arg("-w")
            .arg(wav)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SynthesisError::Engine(format!("cannot run {}: {e}", self.binary)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(SynthesisError::Engine(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl SynthesisEngine for EspeakSynthesizer {
    fn speak(&self, text: &str, voice: &VoiceHandle) -> Result<DecodedAudio, SynthesisError> {
        let wav = tempfile::Builder::new()
            .prefix("polyvoice-")
            .suffix(".wav")
            .tempfile()?;

        self.run(text, voice, wav.path())?;

        let bytes = std::fs::read(wav.path())?;
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
        let output = Command::new(&self.binary)
            .arg("--voices=en")
            .stderr(Stdio::null())
            .output()
            .map_err(|e| SynthesisError::Engine(format!("cannot run {}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(SynthesisError::Engine(format!(
                "{} --voices exited with {}",
                self.binary, output.status
            )));
        }
        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  2  en-gb           --/M      English_(Great_Britain) gmw/en       (en 2)
/// ```
///
/// The language column is what `-v` accepts; duplicates are dropped.
pub fn parse_voice_list(listing: &str) -> Vec<VoiceHandle> {
    let mut voices: Vec<VoiceHandle> = Vec::new();
    for line in listing.lines().skip(1) {
        let Some(language) = line.split_whitespace().nth(1) else {
            continue;
        };
        let voice = VoiceHandle::new(language);
        if !voices.contains(&voice) {
            voices.push(voice);
        }
    }
    voices
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
