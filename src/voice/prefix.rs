//! The spoken "Generating response: …" announcement.

use rand::seq::SliceRandom;
use rand::Rng;

/// The 26-word NATO phonetic alphabet in its official ICAO spelling.
pub const NATO_ALPHABET: [&str; 26] = [
    "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliett",
    "Kilo", "Lima", "Mike", "November", "Oscar", "Papa", "Quebec", "Romeo", "Sierra", "Tango",
    "Uniform", "Victor", "Whiskey", "X-ray", "Yankee", "Zulu",
];

const LEAD: &str = "Generating response: ";
const TOKENS: usize = 3;

/// Builds a prefix of three distinct, uniformly chosen NATO words.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponsePrefix;

impl ResponsePrefix {
    pub fn generate() -> String {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
        let words: Vec<&str> = NATO_ALPHABET
            .choose_multiple(rng, TOKENS)
            .copied()
            .collect();
        format!("{LEAD}{}", words.join(" "))
    }

    /// Display text shown to the user: prefix line, then the utterance.
    pub fn display(prefix: &str, text: &str) -> String {
        format!("{prefix}\n{text}")
    }
}
