// Per-frame pitch tracking
// Every spectral peak inside the analysis band becomes a (frequency, magnitude)
// candidate, refined by parabolic interpolation across neighbouring bins

use crate::audio::stft::{fft_frequencies, stft, DspError};
use crate::audio::AudioBuffer;
use crate::pitch::PitchConfig;

/// Dense candidate grids, frame-major: `pitches[frame][bin]`
///
/// A zero entry means the bin held no peak in that frame.
#[derive(Debug, Clone)]
pub struct PitchTrack {
    pub pitches: Vec<Vec<f32>>,
    pub magnitudes: Vec<Vec<f32>>,
}

impl PitchTrack {
    pub fn n_frames(&self) -> usize {
        self.pitches.len()
    }

    pub fn n_bins(&self) -> usize {
        self.pitches.first().map_or(0, Vec::len)
    }
}

/// Track pitch candidates over the whole signal
pub fn piptrack(buffer: &AudioBuffer, config: &PitchConfig) -> Result<PitchTrack, DspError> {
    let sample_rate = buffer.sample_rate();
    let spec = stft(buffer.samples(), config.n_fft, config.hop_length)?;
    let magnitudes = spec.magnitudes();

    let fmin = config.fmin.max(0.0);
    let fmax = config.fmax.min(sample_rate as f32 / 2.0);
    let freqs = fft_frequencies(sample_rate, config.n_fft);
    let in_band: Vec<bool> = freqs.iter().map(|&f| fmin <= f && f < fmax).collect();
    let bin_hz = sample_rate as f32 / config.n_fft as f32;

    let mut track = PitchTrack {
        pitches: Vec::with_capacity(magnitudes.len()),
        magnitudes: Vec::with_capacity(magnitudes.len()),
    };

    for frame in &magnitudes {
        let n_bins = frame.len();
        let mut pitches = vec![0.0f32; n_bins];
        let mut mags = vec![0.0f32; n_bins];

        let frame_max = frame.iter().copied().fold(0.0f32, f32::max);
        let floor = config.threshold * frame_max;
        let gated = |i: usize| if frame[i] > floor { frame[i] } else { 0.0 };

        // Edge bins have only one neighbour and never count as peaks
        for i in 1..n_bins.saturating_sub(1) {
            if !in_band[i] {
                continue;
            }

            let value = gated(i);
            if !(value > gated(i - 1) && value >= gated(i + 1)) {
                continue;
            }

            let avg = 0.5 * (frame[i + 1] - frame[i - 1]);
            let curvature = 2.0 * frame[i] - frame[i + 1] - frame[i - 1];
            let shift = if curvature.abs() < f32::MIN_POSITIVE {
                avg / (curvature + 1.0)
            } else {
                avg / curvature
            };

            pitches[i] = (i as f32 + shift) * bin_hz;
            mags[i] = frame[i] + 0.5 * avg * shift;
        }

        track.pitches.push(pitches);
        track.magnitudes.push(mags);
    }

    Ok(track)
}
