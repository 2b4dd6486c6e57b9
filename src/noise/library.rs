//! The noise clip folder.
//!
//! The folder may be missing, empty or change between picks; none of that is
//! an error, it just means there is nothing to play right now.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::audio::list_audio_files;

#[derive(Debug, Clone)]
pub struct NoiseLibrary {
    dir: PathBuf,
}

impl NoiseLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current `.wav` / `.mp3` clips; empty when the folder is unreadable.
    pub fn clips(&self) -> Vec<PathBuf> {
        list_audio_files(&self.dir).unwrap_or_default()
    }

    /// One clip chosen uniformly at random, re-scanning the folder.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<PathBuf> {
        self.clips().choose(rng).cloned()
    }
}
