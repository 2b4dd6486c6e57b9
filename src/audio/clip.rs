//! Decoded, ready-to-play audio buffers.
//!
//! [`DecodedAudio`] is the currency between the synthesizer, the noise mixer,
//! the playback device and the segmenter.  Samples are interleaved `f32` in
//! `[-1.0, 1.0]`, exactly as produced by the cpal capture callback.
//!
//! Decoding (`.wav`, `.mp3`) goes through `rodio::Decoder`; encoding back to
//! WAV goes through `hound` as 16-bit PCM.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use rodio::Source;
use thiserror::Error;

use super::resample::{downmix, resample_linear};

/// Sample rate expected by the speech recognizers.
pub const RECOGNITION_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors raised while decoding or encoding audio.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("decoded audio contains no samples")]
    Empty,
}

impl From<rodio::decoder::DecoderError> for AudioError {
    fn from(e: rodio::decoder::DecoderError) -> Self {
        AudioError::Decode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// DecodedAudio
// ---------------------------------------------------------------------------

/// A fully decoded PCM buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Silence of the given length, mostly useful for tests and fixtures.
    pub fn silence(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = ms_to_frames(duration_ms, sample_rate);
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Decode an in-memory WAV or MP3 file.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, AudioError> {
        let decoder = rodio::Decoder::new(Cursor::new(bytes))?;
        Self::from_source(decoder)
    }

    /// Decode a WAV or MP3 file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AudioError> {
        let file = File::open(path.as_ref())?;
        let decoder = rodio::Decoder::new(BufReader::new(file))?;
        Self::from_source(decoder)
    }

    fn from_source<S>(source: S) -> Result<Self, AudioError>
    where
        S: Source,
        S::Item: rodio::Sample,
        f32: rodio::cpal::FromSample<S::Item>,
    {
        let sample_rate = source.sample_rate();
        let channels = source.channels();
        let samples: Vec<f32> = source.convert_samples::<f32>().collect();

        if samples.is_empty() || channels == 0 || sample_rate == 0 {
            return Err(AudioError::Empty);
        }

        Ok(Self::new(samples, sample_rate, channels))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }

    /// Playing time in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    /// Scale every sample by `db` decibels (negative values attenuate).
    pub fn gain_db(mut self, db: f32) -> Self {
        let factor = 10f32.powf(db / 20.0);
        for s in &mut self.samples {
            *s = (*s * factor).clamp(-1.0, 1.0);
        }
        self
    }

    /// Linear fade from silence over the first `ms` milliseconds.
    pub fn fade_in(mut self, ms: u64) -> Self {
        let fade = ms_to_frames(ms, self.sample_rate).min(self.frames());
        let ch = self.channels as usize;
        for frame in 0..fade {
            let g = frame as f32 / fade as f32;
            for s in &mut self.samples[frame * ch..(frame + 1) * ch] {
                *s *= g;
            }
        }
        self
    }

    /// Linear fade to silence over the last `ms` milliseconds.
    pub fn fade_out(mut self, ms: u64) -> Self {
        let frames = self.frames();
        let fade = ms_to_frames(ms, self.sample_rate).min(frames);
        let ch = self.channels as usize;
        for i in 0..fade {
            let frame = frames - fade + i;
            let g = (fade - i - 1) as f32 / fade as f32;
            for s in &mut self.samples[frame * ch..(frame + 1) * ch] {
                *s *= g;
            }
        }
        self
    }

    /// Copy of the span `[start_ms, end_ms)`, clamped to the buffer end.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> Self {
        let frames = self.frames();
        let start = ms_to_frames(start_ms, self.sample_rate).min(frames);
        let end = ms_to_frames(end_ms, self.sample_rate).clamp(start, frames);
        let ch = self.channels as usize;
        Self::new(
            self.samples[start * ch..end * ch].to_vec(),
            self.sample_rate,
            self.channels,
        )
    }

    /// Mono 16 kHz copy for the recognizers.
    pub fn to_mono_16k(&self) -> Vec<f32> {
        let mono = downmix(&self.samples, self.channels);
        resample_linear(&mono, self.sample_rate, RECOGNITION_SAMPLE_RATE)
    }

    /// Encode as a 16-bit PCM WAV file in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, AudioError> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.wav_spec())?;
            self.write_samples(&mut writer)?;
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Encode as a 16-bit PCM WAV file on disk.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<(), AudioError> {
        let mut writer = hound::WavWriter::create(path.as_ref(), self.wav_spec())?;
        self.write_samples(&mut writer)?;
        writer.finalize()?;
        Ok(())
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn write_samples<W>(&self, writer: &mut hound::WavWriter<W>) -> Result<(), AudioError>
    where
        W: std::io::Write + std::io::Seek,
    {
        for &s in &self.samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        Ok(())
    }
}

/// Number of frames spanned by `ms` milliseconds at `sample_rate`.
pub fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duration_ms: u64, sample_rate: u32, channels: u16, level: f32) -> DecodedAudio {
        let frames = ms_to_frames(duration_ms, sample_rate);
        DecodedAudio::new(
            vec![level; frames * channels as usize],
            sample_rate,
            channels,
        )
    }

    #[test]
    fn duration_counts_frames_not_samples() {
        let stereo = tone(1500, 8_000, 2, 0.5);
        assert_eq!(stereo.frames(), 12_000);
        assert_eq!(stereo.duration_ms(), 1500);
    }

    #[test]
    fn gain_minus_eight_db() {
        let quiet = tone(10, 8_000, 1, 0.5).gain_db(-8.0);
        let expected = 0.5 * 10f32.powf(-8.0 / 20.0);
        assert!(quiet.samples.iter().all(|s| (s - expected).abs() < 1e-6));
    }

    #[test]
    fn fades_start_and_end_at_silence() {
        let clip = tone(100, 8_000, 2, 1.0).fade_in(10).fade_out(10);
        // first and last frame are silent on both channels
        assert_eq!(&clip.samples[..2], &[0.0, 0.0]);
        assert_eq!(&clip.samples[clip.samples.len() - 2..], &[0.0, 0.0]);
        // the middle is untouched
        let mid = clip.samples.len() / 2;
        assert!((clip.samples[mid] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fade_longer_than_clip_is_clamped() {
        let clip = tone(5, 8_000, 1, 1.0).fade_in(50).fade_out(50);
        assert_eq!(clip.frames(), 40);
        assert!(clip.samples.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn slice_is_clamped_to_buffer_end() {
        let clip = tone(2500, 1_000, 1, 0.1);
        assert_eq!(clip.slice_ms(0, 1000).duration_ms(), 1000);
        assert_eq!(clip.slice_ms(2000, 3000).duration_ms(), 500);
        assert!(clip.slice_ms(3000, 4000).is_empty());
    }

    #[test]
    fn wav_bytes_decode_back() {
        let clip = tone(200, 16_000, 1, 0.25);
        let bytes = clip.to_wav_bytes().expect("encode");
        let decoded = DecodedAudio::decode(bytes).expect("decode");
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.frames(), clip.frames());
        assert!((decoded.samples[100] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn decode_garbage_is_an_error() {
        let err = DecodedAudio::decode(b"definitely not audio".to_vec()).unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
    }

    #[test]
    fn to_mono_16k_downmixes_and_resamples() {
        let clip = tone(100, 48_000, 2, 0.5);
        let mono = clip.to_mono_16k();
        assert_eq!(mono.len(), 1600);
        assert!(mono.iter().all(|s| (s - 0.5).abs() < 1e-5));
    }
}
