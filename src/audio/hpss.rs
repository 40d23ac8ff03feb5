// Harmonic/percussive source separation
// Median filtering across time keeps sustained partials, across frequency keeps
// broadband transients; soft masks split the spectrogram between the two

use serde::{Deserialize, Serialize};

use crate::audio::stft::{istft, stft, DspError};
use crate::audio::AudioBuffer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HpssConfig {
    pub n_fft: usize,
    pub hop_length: usize,

    /// Median filter length in frames (harmonic) and bins (percussive); odd
    pub kernel_size: usize,

    /// Exponent applied to the enhanced spectrograms before masking
    pub power: f32,
}

impl Default for HpssConfig {
    fn default() -> Self {
        HpssConfig {
            n_fft: 2048,
            hop_length: 512,
            kernel_size: 31,
            power: 2.0,
        }
    }
}

/// Map an out-of-range index back into `0..n` by mirroring, repeating the edge sample
fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m >= n {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}

/// Sliding median with a centred window of `kernel_size` and reflected edges
pub fn median_filter(values: &[f32], kernel_size: usize) -> Vec<f32> {
    if values.is_empty() || kernel_size <= 1 {
        return values.to_vec();
    }

    let half = (kernel_size / 2) as isize;
    let mut window = Vec::with_capacity(kernel_size);

    (0..values.len() as isize)
        .map(|centre| {
            window.clear();
            window.extend(
                (centre - half..=centre + half).map(|i| values[reflect_index(i, values.len())]),
            );
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            *median
        })
        .collect()
}

/// Median along time for every frequency bin
fn harmonic_enhance(magnitudes: &[Vec<f32>], kernel_size: usize) -> Vec<Vec<f32>> {
    let n_frames = magnitudes.len();
    let n_bins = magnitudes.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0f32; n_bins]; n_frames];

    let mut column = vec![0.0f32; n_frames];
    for bin in 0..n_bins {
        for (value, frame) in column.iter_mut().zip(magnitudes) {
            *value = frame[bin];
        }
        for (frame, filtered) in out.iter_mut().zip(median_filter(&column, kernel_size)) {
            frame[bin] = filtered;
        }
    }

    out
}

/// Median along frequency for every frame
fn percussive_enhance(magnitudes: &[Vec<f32>], kernel_size: usize) -> Vec<Vec<f32>> {
    magnitudes
        .iter()
        .map(|frame| median_filter(frame, kernel_size))
        .collect()
}

/// Soft mask `x^p / (x^p + reference^p)`, zero where both inputs are zero
fn soft_mask(x: f32, reference: f32, power: f32) -> f32 {
    let scale = x.max(reference);
    if scale < f32::MIN_POSITIVE {
        return 0.0;
    }

    let own = (x / scale).powf(power);
    let other = (reference / scale).powf(power);
    own / (own + other)
}

/// Split a signal into `(harmonic, percussive)` components of the same length
pub fn separate(
    buffer: &AudioBuffer,
    config: &HpssConfig,
) -> Result<(AudioBuffer, AudioBuffer), DspError> {
    if buffer.is_empty() {
        return Ok((buffer.clone(), buffer.clone()));
    }

    let spec = stft(buffer.samples(), config.n_fft, config.hop_length)?;
    let magnitudes = spec.magnitudes();

    let harmonic_mag = harmonic_enhance(&magnitudes, config.kernel_size);
    let percussive_mag = percussive_enhance(&magnitudes, config.kernel_size);

    let mut harmonic_mask = Vec::with_capacity(magnitudes.len());
    let mut percussive_mask = Vec::with_capacity(magnitudes.len());
    for (h_frame, p_frame) in harmonic_mag.iter().zip(&percussive_mag) {
        harmonic_mask.push(
            h_frame
                .iter()
                .zip(p_frame)
                .map(|(&h, &p)| soft_mask(h, p, config.power))
                .collect::<Vec<_>>(),
        );
        percussive_mask.push(
            h_frame
                .iter()
                .zip(p_frame)
                .map(|(&h, &p)| soft_mask(p, h, config.power))
                .collect::<Vec<_>>(),
        );
    }

    let harmonic = istft(&spec.masked(&harmonic_mask), buffer.len())?;
    let percussive = istft(&spec.masked(&percussive_mask), buffer.len())?;

    Ok((buffer.with_samples(harmonic), buffer.with_samples(percussive)))
}
