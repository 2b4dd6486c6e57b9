//! Channel mixing and sample-rate conversion.
//!
//! The recognizers want **16 kHz mono `f32`**; microphones and decoded files
//! arrive at whatever the device or file dictates.  Both helpers are pure and
//! allocation-only, so they are safe to call from the capture thread.

// ---------------------------------------------------------------------------
// downmix
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// * `channels == 1` returns the input as an owned `Vec`.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use polyvoice::audio::downmix;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4];
/// let mono = downmix(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from_rate` to `to_rate` Hz by linear
/// interpolation.
///
/// The output length is `ceil(samples.len() * to_rate / from_rate)`.
///
/// ```rust
/// use polyvoice::audio::resample_linear;
///
/// let hi = vec![0.5_f32; 480];
/// assert_eq!(resample_linear(&hi, 48_000, 16_000).len(), 160);
/// assert_eq!(resample_linear(&hi, 16_000, 16_000).len(), 480);
/// ```
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;

            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
