//! Energy-based voice activity detection and utterance boundaries.
//!
//! Audio is split into 30 ms frames (480 samples @ 16 kHz).  A frame is
//! classified as *voice* when its RMS amplitude exceeds the configured
//! threshold.
//!
//! [`VadDetector`] trims silence from a finished clip.  [`UtteranceDetector`]
//! is the streaming counterpart used while listening: it ignores silence until
//! speech starts, then closes the utterance after a run of trailing silence
//! (or when the maximum length is reached).

use crate::config::ListenConfig;

/// 30 ms at 16 kHz.
const FRAME_SIZE: usize = 480;

// ---------------------------------------------------------------------------
// VadDetector
// ---------------------------------------------------------------------------

/// Energy-based frame classifier and silence trimmer.
///
/// ```rust
/// use polyvoice::audio::VadDetector;
///
/// let vad = VadDetector::new(0.01);
/// let mut audio = vec![0.0_f32; 480];
/// audio.extend(vec![0.5_f32; 480]);
/// audio.extend(vec![0.0_f32; 480]);
/// assert_eq!(vad.trim_silence(&audio).len(), 480);
/// ```
#[derive(Debug, Clone)]
pub struct VadDetector {
    rms_threshold: f32,
    frame_size: usize,
}

impl VadDetector {
    pub fn new(rms_threshold: f32) -> Self {
        Self {
            rms_threshold,
            frame_size: FRAME_SIZE,
        }
    }

    /// # Panics
    ///
    /// Panics if `frame_size == 0`.
    pub fn with_frame_size(rms_threshold: f32, frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame_size must be > 0");
        Self {
            rms_threshold,
            frame_size,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Returns `true` when the frame contains voice activity.
    pub fn is_voice_frame(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mean_sq: f32 = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        mean_sq.sqrt() > self.rms_threshold
    }

    /// Trim leading and trailing silence, returning a sub-slice of `audio`.
    /// An all-silent signal yields an empty slice.
    pub fn trim_silence<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        let frames: Vec<&[f32]> = audio.chunks(self.frame_size).collect();

        let Some(first) = frames.iter().position(|f| self.is_voice_frame(f)) else {
            return &audio[0..0];
        };
        let last = frames
            .iter()
            .rposition(|f| self.is_voice_frame(f))
            .unwrap_or(first);

        let start = first * self.frame_size;
        let end = ((last + 1) * self.frame_size).min(audio.len());
        &audio[start..end]
    }
}

// ---------------------------------------------------------------------------
// UtteranceDetector
// ---------------------------------------------------------------------------

/// Streaming utterance segmentation over 16 kHz mono samples.
#[derive(Debug)]
pub struct UtteranceDetector {
    vad: VadDetector,
    /// Consecutive silent frames that close an utterance.
    end_silence_frames: usize,
    /// Utterances shorter than this many samples are dropped.
    min_samples: usize,
    /// Utterances are force-closed at this many samples.
    max_samples: usize,
    /// Samples that do not yet fill a whole frame.
    pending: Vec<f32>,
    /// Audio of the utterance in progress.
    current: Vec<f32>,
    in_speech: bool,
    silent_run: usize,
}

impl UtteranceDetector {
    pub fn new(config: &ListenConfig, sample_rate: u32) -> Self {
        let vad = VadDetector::new(config.vad_threshold);
        let frame_ms = (vad.frame_size() as u64 * 1000 / sample_rate.max(1) as u64).max(1);
        Self {
            end_silence_frames: (config.end_silence_ms / frame_ms).max(1) as usize,
            min_samples: (config.min_utterance_secs * sample_rate as f32) as usize,
            max_samples: (config.max_utterance_secs * sample_rate as f32).max(1.0) as usize,
            vad,
            pending: Vec::new(),
            current: Vec::new(),
            in_speech: false,
            silent_run: 0,
        }
    }

    /// `true` once speech has started and the utterance is still open.
    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Feed samples; returns the finished utterance (trailing silence
    /// trimmed) as soon as one closes.  Samples after the boundary in the
    /// same call are discarded.
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        self.pending.extend_from_slice(samples);
        let frame_size = self.vad.frame_size();

        while self.pending.len() >= frame_size {
            let frame: Vec<f32> = self.pending.drain(..frame_size).collect();
            let voiced = self.vad.is_voice_frame(&frame);

            if !self.in_speech {
                if voiced {
                    self.in_speech = true;
                    self.silent_run = 0;
                    self.current = frame;
                }
                continue;
            }

            self.current.extend_from_slice(&frame);
            self.silent_run = if voiced { 0 } else { self.silent_run + 1 };

            if self.silent_run >= self.end_silence_frames || self.current.len() >= self.max_samples
            {
                if let Some(utterance) = self.close() {
                    return Some(utterance);
                }
            }
        }
        None
    }

    /// Close the utterance in progress.  Returns `None` when it was too short.
    fn close(&mut self) -> Option<Vec<f32>> {
        let audio = std::mem::take(&mut self.current);
        self.in_speech = false;
        self.silent_run = 0;
        self.pending.clear();

        let voiced = self.vad.trim_silence(&audio);
        if voiced.len() < self.min_samples {
            log::debug!("vad: dropped {} samples of non-speech", audio.len());
            return None;
        }
        Some(voiced.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
