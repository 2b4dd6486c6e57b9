//! Voice selection for the spoken output: per-word rotation and the
//! phonetic-alphabet announcement spoken before each utterance.

pub mod prefix;
pub mod rotation;

pub use prefix::{ResponsePrefix, NATO_ALPHABET};
pub use rotation::{VoiceError, VoiceRotation};
