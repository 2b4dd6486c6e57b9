//! Random voice selection without immediate repeats.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::tts::VoiceHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("the synthesis engine reports no voices")]
    NoVoices,
}

/// Fixed, non-empty voice set with a "never the same voice twice in a row"
/// picker.
///
/// With a single voice the constraint cannot hold and that voice is always
/// returned.
#[derive(Debug, Clone)]
pub struct VoiceRotation {
    voices: Vec<VoiceHandle>,
}

impl VoiceRotation {
    /// Duplicates are dropped, keeping first-seen order.
    pub fn new(voices: Vec<VoiceHandle>) -> Result<Self, VoiceError> {
        let mut distinct: Vec<VoiceHandle> = Vec::with_capacity(voices.len());
        for voice in voices {
            if !distinct.contains(&voice) {
                distinct.push(voice);
            }
        }
        if distinct.is_empty() {
            return Err(VoiceError::NoVoices);
        }
        Ok(Self { voices: distinct })
    }

    pub fn voices(&self) -> &[VoiceHandle] {
        &self.voices
    }

    /// The engine's default voice (first enumerated).
    pub fn default_voice(&self) -> &VoiceHandle {
        &self.voices[0]
    }

    /// Pick the voice for the next word using the thread RNG.
    pub fn next(&self, previous: Option<&VoiceHandle>) -> VoiceHandle {
        self.next_with(previous, &mut rand::thread_rng())
    }

    /// Pick uniformly among the voices other than `previous`.
    ///
    /// The set holds distinct voices, so with two or more of them rejection
    /// sampling terminates with probability 1.
    pub fn next_with<R: Rng + ?Sized>(
        &self,
        previous: Option<&VoiceHandle>,
        rng: &mut R,
    ) -> VoiceHandle {
        if self.voices.len() == 1 {
            return self.voices[0].clone();
        }
        loop {
            let Some(candidate) = self.voices.choose(rng) else {
                return self.voices[0].clone();
            };
            if Some(candidate) != previous {
                return candidate.clone();
            }
        }
    }
}
