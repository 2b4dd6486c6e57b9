//! Offline segmenter: cut every recording in a folder into chunk files.
//!
//! ```text
//! source/lecture.mp3 (2.5 s), Fixed 1000 ms
//!   └─▶ out/lecture_chunk0.wav  (1000 ms)
//!       out/lecture_chunk1.wav  (1000 ms)
//!       out/lecture_chunk2.wav  ( 500 ms)
//!
//! Random 500..=3500 ms names chunks by start offset instead:
//!   └─▶ out/lecture_chunk0.wav, out/lecture_chunk1834.wav, …
//! ```
//!
//! A file that fails to decode is reported in [`SegmentReport::failed`] and
//! the batch carries on.

pub mod plan;

pub use plan::{plan_chunks, Chunk, ChunkMode};

use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;

use crate::audio::{list_audio_files, AudioError, DecodedAudio};

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("invalid chunk mode: {0}")]
    InvalidMode(String),
}

/// Outcome of [`segment_dir`].
#[derive(Debug, Default)]
pub struct SegmentReport {
    /// Every chunk file written, in order.
    pub exported: Vec<PathBuf>,
    /// Source files that could not be segmented, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Output file name for `chunk` of the recording named `base`.
pub fn chunk_file_name(base: &str, mode: ChunkMode, chunk: &Chunk) -> String {
    match mode {
        ChunkMode::Fixed { .. } => format!("{base}_chunk{}.wav", chunk.index),
        ChunkMode::Random { .. } => format!("{base}_chunk{}.wav", chunk.start_ms),
    }
}

/// Segment one recording into `output_dir`.
pub fn segment_file<R: Rng + ?Sized>(
    source: &Path,
    output_dir: &Path,
    mode: ChunkMode,
    rng: &mut R,
) -> Result<Vec<PathBuf>, SegmentError> {
    mode.validate()?;
    let audio = DecodedAudio::open(source)?;
    let base = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());

    let chunks = plan_chunks(audio.duration_ms(), mode, rng);
    let mut written = Vec::with_capacity(chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        // The last chunk also takes the sub-millisecond tail.
        let end = if i + 1 == chunks.len() {
            chunk.end_ms() + 1
        } else {
            chunk.end_ms()
        };
        let path = output_dir.join(chunk_file_name(&base, mode, chunk));
        audio.slice_ms(chunk.start_ms, end).write_wav(&path)?;
        log::info!("segment: exported {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Segment every `.wav` / `.mp3` file directly inside `source_dir`.
///
/// `output_dir` is created if needed.  Per-file failures are collected in
/// the report; only an invalid mode or an unreadable source folder fails the
/// whole call.
pub fn segment_dir(
    source_dir: &Path,
    output_dir: &Path,
    mode: ChunkMode,
) -> Result<SegmentReport, SegmentError> {
    mode.validate()?;
    let sources = list_audio_files(source_dir)?;
    std::fs::create_dir_all(output_dir)?;

    let mut rng = rand::thread_rng();
    let mut report = SegmentReport::default();

    for source in sources {
        match segment_file(&source, output_dir, mode, &mut rng) {
            Ok(mut files) => report.exported.append(&mut files),
            Err(e) => {
                log::warn!("segment: skipping {}: {e}", source.display());
                report.failed.push((source, e.to_string()));
            }
        }
    }

    log::info!(
        "segment: {} chunk(s) written, {} file(s) failed",
        report.exported.len(),
        report.failed.len()
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
