//! Background noise: the clip folder and the mixer loop that plays it under
//! the spoken words.

pub mod library;
pub mod mixer;

pub use library::NoiseLibrary;
pub use mixer::{NoiseError, NoiseMixer, NoiseSession};
