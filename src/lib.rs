//! polyvoice: listen, re-speak each word in a different synthetic voice,
//! optionally over background noise.  Also ships an offline segmenter that
//! cuts recordings into fixed or random-length chunks.

pub mod audio;
pub mod cli;
pub mod config;
pub mod console;
pub mod noise;
pub mod pipeline;
pub mod segment;
pub mod stt;
pub mod tts;
pub mod voice;
