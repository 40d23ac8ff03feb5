// Signal conditioning
// Silence trimming, spectral noise reduction, peak normalization and pre-emphasis,
// always applied in that order

use serde::{Deserialize, Serialize};

use crate::audio::stft::{istft, stft, DspError};
use crate::audio::AudioBuffer;

/// Silence trimming parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Frames quieter than this many dB below the loudest frame count as silence
    pub top_db: f32,

    /// RMS analysis window in samples
    pub frame_length: usize,

    /// Hop between RMS frames in samples
    pub hop_length: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        TrimConfig {
            top_db: 60.0,
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

/// Spectral-subtraction noise reduction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Multiplier on the noise profile before subtraction (0 disables)
    pub aggressiveness: f32,

    /// Fraction of lowest-energy frames used to estimate the noise profile
    pub noise_percentile: f32,

    /// Minimum fraction of the original magnitude kept in every bin
    pub spectral_floor: f32,

    pub n_fft: usize,
    pub hop_length: usize,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        DenoiseConfig {
            aggressiveness: 1.0,
            noise_percentile: 0.1,
            spectral_floor: 0.05,
            n_fft: 1024,
            hop_length: 256,
        }
    }
}

/// Default first-order pre-emphasis coefficient
pub const DEFAULT_PRE_EMPHASIS: f32 = 0.97;

/// Run all conditioning steps: trim, denoise, normalize, pre-emphasize
pub fn condition(
    buffer: &AudioBuffer,
    trim: &TrimConfig,
    denoise: &DenoiseConfig,
    pre_emphasis_coef: f32,
) -> Result<AudioBuffer, DspError> {
    let trimmed = trim_silence(buffer, trim);
    let denoised = reduce_noise(&trimmed, denoise)?;
    let normalized = normalize(&denoised);
    let emphasized = pre_emphasis(&normalized, pre_emphasis_coef);

    log::debug!(
        "Conditioned {} -> {} samples (peak before normalization {:.4})",
        buffer.len(),
        emphasized.len(),
        denoised.peak()
    );

    Ok(emphasized)
}

/// Mean square of each centred frame, zero-padded at the edges
fn frame_energy(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    if samples.is_empty() || frame_length == 0 || hop_length == 0 {
        return Vec::new();
    }

    let half = frame_length / 2;
    let n_frames = 1 + samples.len() / hop_length;

    (0..n_frames)
        .map(|frame| {
            let centre = frame * hop_length;
            let start = centre.saturating_sub(half);
            let end = (centre + frame_length - half).min(samples.len());
            let sum: f32 = samples[start.min(end)..end].iter().map(|s| s * s).sum();
            sum / frame_length as f32
        })
        .collect()
}

/// Remove leading and trailing spans more than `top_db` below the loudest frame
///
/// A signal with no energy at all has no reference level and is returned as is.
pub fn trim_silence(buffer: &AudioBuffer, config: &TrimConfig) -> AudioBuffer {
    let samples = buffer.samples();
    let energy = frame_energy(samples, config.frame_length, config.hop_length);

    let peak = energy.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return buffer.clone();
    }

    let threshold = peak * 10f32.powf(-config.top_db / 10.0);
    let first = energy.iter().position(|&e| e > threshold);
    let last = energy.iter().rposition(|&e| e > threshold);

    match (first, last) {
        (Some(first), Some(last)) => {
            let start = (first * config.hop_length).min(samples.len());
            let end = ((last + 1) * config.hop_length).min(samples.len());
            buffer.with_samples(samples[start..end.max(start)].to_vec())
        }
        _ => buffer.clone(),
    }
}

/// Per-bin noise magnitude averaged over the quietest frames
fn noise_profile(magnitudes: &[Vec<f32>], percentile: f32) -> Vec<f32> {
    let Some(first) = magnitudes.first() else {
        return Vec::new();
    };

    let energy: Vec<f32> = magnitudes
        .iter()
        .map(|frame| frame.iter().map(|m| m * m).sum())
        .collect();

    let mut order: Vec<usize> = (0..magnitudes.len()).collect();
    order.sort_by(|&a, &b| energy[a].total_cmp(&energy[b]));

    let count = ((magnitudes.len() as f32 * percentile).ceil() as usize).clamp(1, magnitudes.len());

    let mut profile = vec![0.0f32; first.len()];
    for &frame in &order[..count] {
        for (p, m) in profile.iter_mut().zip(&magnitudes[frame]) {
            *p += m;
        }
    }
    for p in profile.iter_mut() {
        *p /= count as f32;
    }

    profile
}

/// Spectral subtraction against a noise profile estimated from the signal itself
pub fn reduce_noise(buffer: &AudioBuffer, config: &DenoiseConfig) -> Result<AudioBuffer, DspError> {
    if buffer.is_empty() {
        return Ok(buffer.clone());
    }

    let spec = stft(buffer.samples(), config.n_fft, config.hop_length)?;
    let magnitudes = spec.magnitudes();
    let noise = noise_profile(&magnitudes, config.noise_percentile);

    let gains: Vec<Vec<f32>> = magnitudes
        .iter()
        .map(|frame| {
            frame
                .iter()
                .zip(&noise)
                .map(|(&mag, &noise_mag)| {
                    if mag <= 0.0 {
                        return 0.0;
                    }
                    let cleaned =
                        (mag - config.aggressiveness * noise_mag).max(config.spectral_floor * mag);
                    cleaned / mag
                })
                .collect()
        })
        .collect();

    let cleaned = istft(&spec.masked(&gains), buffer.len())?;
    Ok(buffer.with_samples(cleaned))
}

/// Rescale so the largest absolute sample is 1.0; silent input is unchanged
pub fn normalize(buffer: &AudioBuffer) -> AudioBuffer {
    let peak = buffer.peak();
    if peak <= 0.0 || !peak.is_finite() {
        return buffer.clone();
    }

    buffer.with_samples(buffer.samples().iter().map(|s| s / peak).collect())
}

/// First-order high-pass `y[n] = x[n] - coef * x[n-1]`
///
/// The sample before `x[0]` is extrapolated as `2 * x[0] - x[1]`.
pub fn pre_emphasis(buffer: &AudioBuffer, coef: f32) -> AudioBuffer {
    let samples = buffer.samples();
    let Some(&first) = samples.first() else {
        return buffer.clone();
    };

    let initial = match samples.get(1) {
        Some(&second) => 2.0 * first - second,
        None => first,
    };

    let emphasized = std::iter::once(first - coef * initial)
        .chain(samples.windows(2).map(|pair| pair[1] - coef * pair[0]))
        .collect();

    buffer.with_samples(emphasized)
}
