//! Chunk planning: where each chunk of a recording starts and how long it is.

use rand::Rng;

use super::SegmentError;

/// How a recording is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    /// Equal chunks of `length_ms`; the last one may be shorter.
    Fixed { length_ms: u64 },
    /// Each chunk length drawn uniformly from `min_ms..=max_ms`; the
    /// recording may end before the last chunk's boundary.
    Random { min_ms: u64, max_ms: u64 },
}

impl ChunkMode {
    pub fn validate(&self) -> Result<(), SegmentError> {
        match *self {
            ChunkMode::Fixed { length_ms: 0 } => Err(SegmentError::InvalidMode(
                "chunk length must be > 0 ms".into(),
            )),
            ChunkMode::Random { min_ms: 0, .. } => Err(SegmentError::InvalidMode(
                "minimum chunk length must be > 0 ms".into(),
            )),
            ChunkMode::Random { min_ms, max_ms } if min_ms > max_ms => {
                Err(SegmentError::InvalidMode(format!(
                    "minimum chunk length {min_ms} ms exceeds maximum {max_ms} ms"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// One contiguous slice of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start_ms: u64,
    pub len_ms: u64,
}

impl Chunk {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.len_ms
    }
}

/// Cover `[0, total_ms)` with consecutive, non-overlapping chunks.
///
/// `mode` must have passed [`ChunkMode::validate`].
pub fn plan_chunks<R: Rng + ?Sized>(total_ms: u64, mode: ChunkMode, rng: &mut R) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut start = 0u64;

    while start < total_ms {
        let nominal = match mode {
            ChunkMode::Fixed { length_ms } => length_ms,
            ChunkMode::Random { min_ms, max_ms } => rng.gen_range(min_ms..=max_ms),
        };
        if nominal == 0 {
            break;
        }
        chunks.push(Chunk {
            index: chunks.len(),
            start_ms: start,
            len_ms: nominal.min(total_ms - start),
        });
        start += nominal;
    }
    chunks
}
