// Short-time Fourier analysis
// Centred Hann-windowed STFT, overlap-add inverse, and the mel filterbank
// shared by conditioning, separation, onset and pitch stages

use realfft::num_complex::Complex;
use realfft::{FftError, RealFftPlanner};
use thiserror::Error;

/// Errors raised by the spectral transforms
///
/// Only produced when a buffer does not match its FFT plan, which the
/// functions in this module never do for well-formed input.
#[derive(Debug, Error)]
pub enum DspError {
    #[error("FFT failed: {0}")]
    Fft(#[from] FftError),
}

/// Complex spectrogram, stored frame-major: `frames[frame][bin]`
#[derive(Debug, Clone)]
pub struct Stft {
    pub frames: Vec<Vec<Complex<f32>>>,
    pub n_fft: usize,
    pub hop_length: usize,
}

impl Stft {
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Magnitude spectrogram `|X|`
    pub fn magnitudes(&self) -> Vec<Vec<f32>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Power spectrogram `|X|^2`
    pub fn power(&self) -> Vec<Vec<f32>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
            .collect()
    }

    /// Scale every bin by a real-valued mask of the same shape
    pub fn masked(&self, mask: &[Vec<f32>]) -> Stft {
        let frames = self
            .frames
            .iter()
            .zip(mask)
            .map(|(frame, gains)| {
                frame
                    .iter()
                    .zip(gains)
                    .map(|(&bin, &gain)| bin * gain)
                    .collect()
            })
            .collect();

        Stft {
            frames,
            n_fft: self.n_fft,
            hop_length: self.hop_length,
        }
    }
}

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }

    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Number of centred frames for a signal of `len` samples
pub fn frame_count(len: usize, n_fft: usize, hop_length: usize) -> usize {
    let padded = len + 2 * (n_fft / 2);
    if hop_length == 0 || padded < n_fft {
        return 0;
    }
    1 + (padded - n_fft) / hop_length
}

/// Forward STFT with frames centred on `frame * hop_length`
/// The signal is zero-padded by `n_fft / 2` on both sides
pub fn stft(samples: &[f32], n_fft: usize, hop_length: usize) -> Result<Stft, DspError> {
    let n_frames = frame_count(samples.len(), n_fft, hop_length);
    let pad = n_fft / 2;

    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let window = hann_window(n_fft);
    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut input = fft.make_input_vec();
    let mut frames = Vec::with_capacity(n_frames);

    for frame_idx in 0..n_frames {
        let start = frame_idx * hop_length;
        for ((dst, &src), &w) in input
            .iter_mut()
            .zip(&padded[start..start + n_fft])
            .zip(&window)
        {
            *dst = src * w;
        }

        let mut spectrum = fft.make_output_vec();
        fft.process(&mut input, &mut spectrum)?;
        frames.push(spectrum);
    }

    Ok(Stft {
        frames,
        n_fft,
        hop_length,
    })
}

/// Inverse STFT by windowed overlap-add, trimmed or zero-padded to `length`
pub fn istft(spec: &Stft, length: usize) -> Result<Vec<f32>, DspError> {
    let n_fft = spec.n_fft;
    let hop_length = spec.hop_length;

    if spec.frames.is_empty() || n_fft == 0 {
        return Ok(vec![0.0; length]);
    }

    let window = hann_window(n_fft);
    let mut planner = RealFftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);

    let total = n_fft + hop_length * (spec.n_frames() - 1);
    let mut signal = vec![0.0f32; total];
    let mut window_sum = vec![0.0f32; total];

    let mut spectrum = ifft.make_input_vec();
    let mut frame = ifft.make_output_vec();
    let scale = 1.0 / n_fft as f32;
    let last_bin = spectrum.len() - 1;

    for (frame_idx, bins) in spec.frames.iter().enumerate() {
        spectrum.copy_from_slice(bins);
        // DC and Nyquist must be purely real for a real-valued inverse
        spectrum[0].im = 0.0;
        if n_fft % 2 == 0 {
            spectrum[last_bin].im = 0.0;
        }

        ifft.process(&mut spectrum, &mut frame)?;

        let offset = frame_idx * hop_length;
        for (i, (&x, &w)) in frame.iter().zip(&window).enumerate() {
            signal[offset + i] += x * scale * w;
            window_sum[offset + i] += w * w;
        }
    }

    for (x, &norm) in signal.iter_mut().zip(&window_sum) {
        if norm > f32::MIN_POSITIVE {
            *x /= norm;
        }
    }

    let pad = n_fft / 2;
    let mut output: Vec<f32> = signal.into_iter().skip(pad).take(length).collect();
    output.resize(length, 0.0);

    Ok(output)
}

/// Centre frequency of every FFT bin in Hz
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}

/// Frame index containing time `secs`
pub fn time_to_frame(secs: f64, sample_rate: u32, hop_length: usize) -> usize {
    let sample = (secs * sample_rate as f64).max(0.0) as usize;
    sample / hop_length.max(1)
}

/// Start time of a frame in seconds
pub fn frame_to_time(frame: usize, sample_rate: u32, hop_length: usize) -> f64 {
    (frame * hop_length) as f64 / sample_rate as f64
}

// Slaney mel scale: linear below 1 kHz, logarithmic above
const MEL_F_SP: f32 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f32 = 1000.0;
const MEL_MIN_LOG_MEL: f32 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f32 {
    6.4f32.ln() / 27.0
}

pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        mel * MEL_F_SP
    }
}

/// Triangular mel filterbank with Slaney area normalisation
/// Returns `n_mels` rows of `n_fft / 2 + 1` weights
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let mel_f: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
        .collect();

    (0..n_mels)
        .map(|m| {
            let lower_width = mel_f[m + 1] - mel_f[m];
            let upper_width = mel_f[m + 2] - mel_f[m + 1];
            let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);

            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - mel_f[m]) / lower_width;
                    let upper = (mel_f[m + 2] - f) / upper_width;
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Convert power values to decibels relative to 1.0,
/// clipped to `top_db` below the loudest value
pub fn power_to_db(power: &[Vec<f32>], top_db: f32) -> Vec<Vec<f32>> {
    const AMIN: f32 = 1e-10;

    let mut db: Vec<Vec<f32>> = power
        .iter()
        .map(|row| row.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();

    let peak = db
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);

    if peak.is_finite() {
        let floor = peak - top_db;
        for value in db.iter_mut().flat_map(|row| row.iter_mut()) {
            *value = value.max(floor);
        }
    }

    db
}
