// Onset/offset segmentation
// Mel spectral flux onset strength, adaptive peak picking, and conversion of
// onset times into contiguous time segments

use serde::{Deserialize, Serialize};

use crate::audio::stft::{frame_to_time, mel_filterbank, power_to_db, stft, DspError};
use crate::audio::AudioBuffer;

/// Onset detection result
#[derive(Debug, Clone, PartialEq)]
pub struct Onset {
    /// Seconds from start of audio
    pub time_secs: f64,

    /// Normalized onset strength at the detected frame [0.0, 1.0]
    pub strength: f32,
}

/// Half-open time range `[start, end)` in seconds, derived from onsets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSegment {
    pub start: f64,
    pub end: f64,
}

impl TimeSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Configuration for onset detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// FFT window size in samples
    pub n_fft: usize,

    /// Hop size in samples (advance between frames)
    pub hop_length: usize,

    /// Mel bands aggregated into the strength curve
    pub n_mels: usize,

    /// Frame distance for the spectral difference
    pub lag: usize,

    /// Look-behind for the local maximum test, in seconds
    pub pre_max_s: f64,

    /// Look-ahead for the local maximum test, in seconds
    pub post_max_s: f64,

    /// Look-behind for the moving average, in seconds
    pub pre_avg_s: f64,

    /// Look-ahead for the moving average, in seconds
    pub post_avg_s: f64,

    /// Minimum spacing between onsets, in seconds
    pub wait_s: f64,

    /// Sensitivity: how far the normalized strength must exceed its moving average
    pub delta: f32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            lag: 1,
            pre_max_s: 0.03,
            post_max_s: 0.0,
            pre_avg_s: 0.10,
            post_avg_s: 0.10,
            wait_s: 0.03,
            delta: 0.07,
        }
    }
}

/// Onset strength per STFT frame
///
/// Mean over mel bands of the positive dB difference to `lag` frames earlier.
/// The curve is delayed by `lag + n_fft / (2 * hop)` frames so that peaks line
/// up with the frame where the energy rise is centred.
pub fn onset_strength(buffer: &AudioBuffer, config: &OnsetConfig) -> Result<Vec<f32>, DspError> {
    let spec = stft(buffer.samples(), config.n_fft, config.hop_length)?;
    let n_frames = spec.n_frames();
    let lag = config.lag.max(1);

    if n_frames <= lag {
        return Ok(vec![0.0; n_frames]);
    }

    let sample_rate = buffer.sample_rate();
    let filterbank = mel_filterbank(
        sample_rate,
        config.n_fft,
        config.n_mels,
        0.0,
        sample_rate as f32 / 2.0,
    );

    let mel_power: Vec<Vec<f32>> = spec
        .power()
        .iter()
        .map(|frame| {
            filterbank
                .iter()
                .map(|weights| weights.iter().zip(frame).map(|(w, p)| w * p).sum())
                .collect()
        })
        .collect();
    let mel_db = power_to_db(&mel_power, 80.0);

    let pad = lag + config.n_fft / (2 * config.hop_length.max(1));
    let mut strength = vec![0.0f32; pad.min(n_frames)];

    for t in lag..n_frames {
        if strength.len() >= n_frames {
            break;
        }
        let flux: f32 = mel_db[t]
            .iter()
            .zip(&mel_db[t - lag])
            .map(|(curr, prev)| (curr - prev).max(0.0))
            .sum();
        strength.push(flux / config.n_mels.max(1) as f32);
    }

    Ok(strength)
}

/// Pick onset frames from a normalized strength curve
///
/// Frame `n` is an onset when it is the maximum of `[n - pre_max, n + post_max]`,
/// reaches `delta` above the mean of `[n - pre_avg, n + post_avg]`, and lies more
/// than `wait` frames after the previous onset.
fn pick_peaks(envelope: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<usize> {
    let frames_for = |secs: f64| (secs * sample_rate as f64 / config.hop_length as f64) as usize;

    let pre_max = frames_for(config.pre_max_s);
    let post_max = frames_for(config.post_max_s) + 1;
    let pre_avg = frames_for(config.pre_avg_s);
    let post_avg = frames_for(config.post_avg_s) + 1;
    let wait = frames_for(config.wait_s);

    let n = envelope.len();
    let mut peaks = Vec::new();
    let mut last_peak: Option<usize> = None;

    for i in 0..n {
        let max_window = &envelope[i.saturating_sub(pre_max)..(i + post_max).min(n)];
        let local_max = max_window.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if envelope[i] < local_max {
            continue;
        }

        let avg_window = &envelope[i.saturating_sub(pre_avg)..(i + post_avg).min(n)];
        let mean = avg_window.iter().sum::<f32>() / avg_window.len() as f32;
        if envelope[i] < mean + config.delta {
            continue;
        }

        if last_peak.map_or(true, |last| i > last + wait) {
            peaks.push(i);
            last_peak = Some(i);
        }
    }

    peaks
}

/// Detect onsets in the signal, strictly increasing in time
pub fn detect_onsets(buffer: &AudioBuffer, config: &OnsetConfig) -> Result<Vec<Onset>, DspError> {
    if buffer.is_empty() || config.hop_length == 0 {
        return Ok(Vec::new());
    }

    let strength = onset_strength(buffer, config)?;

    let min = strength.iter().copied().fold(f32::INFINITY, f32::min);
    let max = strength.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if strength.is_empty() || max <= 0.0 {
        return Ok(Vec::new());
    }

    // Rescale to [0, 1] before thresholding
    let range = max - min + f32::MIN_POSITIVE;
    let normalized: Vec<f32> = strength.iter().map(|s| (s - min) / range).collect();

    let sample_rate = buffer.sample_rate();
    let duration = buffer.duration_secs();

    let onsets = pick_peaks(&normalized, sample_rate, config)
        .into_iter()
        .map(|frame| Onset {
            time_secs: frame_to_time(frame, sample_rate, config.hop_length),
            strength: normalized[frame],
        })
        // An onset at the very end would open an empty segment
        .filter(|onset| onset.time_secs < duration)
        .collect();

    Ok(onsets)
}

/// Derive segments from strictly increasing onset times
///
/// Segment `i` runs from onset `i` to onset `i + 1`; the last runs to `duration_secs`.
pub fn segments_from_onsets(onset_times: &[f64], duration_secs: f64) -> Vec<TimeSegment> {
    onset_times
        .iter()
        .enumerate()
        .map(|(i, &start)| TimeSegment {
            start,
            end: onset_times.get(i + 1).copied().unwrap_or(duration_secs),
        })
        .collect()
}

/// Segment a harmonic signal at its detected onsets
pub fn segment(harmonic: &AudioBuffer, config: &OnsetConfig) -> Result<Vec<TimeSegment>, DspError> {
    let onsets = detect_onsets(harmonic, config)?;
    let times: Vec<f64> = onsets.iter().map(|o| o.time_secs).collect();

    log::debug!("Detected {} onsets: {:?}", times.len(), times);

    Ok(segments_from_onsets(&times, harmonic.duration_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * secs) as usize;
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_segments_cover_onsets_to_duration() {
        let onsets = [0.1, 0.5, 1.2];
        let segments = segments_from_onsets(&onsets, 2.0);

        assert_eq!(segments.len(), onsets.len());
        assert_eq!(segments[0].start, 0.1);
        assert_eq!(segments.last().unwrap().end, 2.0);
        for pair in segments.windows(2) {
            // No gaps, no overlaps
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(segments.iter().all(|s| s.start < s.end));
    }

    #[test]
    fn test_single_onset_spans_whole_signal() {
        let segments = segments_from_onsets(&[0.0], 1.5);
        assert_eq!(segments, vec![TimeSegment { start: 0.0, end: 1.5 }]);
        assert_eq!(segments[0].duration(), 1.5);
    }

    #[test]
    fn test_no_onsets_no_segments() {
        assert!(segments_from_onsets(&[], 3.0).is_empty());
    }

    #[test]
    fn test_onset_detection_empty() {
        let buffer = AudioBuffer::new(vec![], 44100);
        let onsets = detect_onsets(&buffer, &OnsetConfig::default()).unwrap();
        assert!(onsets.is_empty());
    }

    #[test]
    fn test_silent_signal_has_no_onsets() {
        let buffer = AudioBuffer::new(vec![0.0; 22050], 22050);
        assert!(segment(&buffer, &OnsetConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_onset_strength_frame_count() {
        let buffer = AudioBuffer::new(tone(440.0, 22050, 1.0), 22050);
        let strength = onset_strength(&buffer, &OnsetConfig::default()).unwrap();
        assert_eq!(strength.len(), 1 + 22050 / 512);
        // Padded frames carry no strength
        assert!(strength[..3].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_detects_note_entry_after_silence() {
        let sample_rate = 22050;
        let mut samples = vec![0.0; 11025];
        samples.extend(tone(440.0, sample_rate, 1.0));
        let buffer = AudioBuffer::new(samples, sample_rate);

        let onsets = detect_onsets(&buffer, &OnsetConfig::default()).unwrap();

        assert!(!onsets.is_empty());
        // The strongest onset sits where the tone enters
        let strongest = onsets
            .iter()
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
            .unwrap();
        assert!((strongest.time_secs - 0.5).abs() < 0.1);
    }

    #[test]
    fn test_onsets_strictly_increasing() {
        let sample_rate = 22050;
        let mut samples = Vec::new();
        for freq in [330.0, 440.0, 550.0, 660.0] {
            samples.extend(vec![0.0; 4410]);
            samples.extend(tone(freq, sample_rate, 0.4));
        }
        let buffer = AudioBuffer::new(samples, sample_rate);

        let onsets = detect_onsets(&buffer, &OnsetConfig::default()).unwrap();
        assert!(onsets.len() >= 2);
        for pair in onsets.windows(2) {
            assert!(pair[0].time_secs < pair[1].time_secs);
        }
        assert!(onsets.iter().all(|o| o.time_secs < buffer.duration_secs()));
    }

    #[test]
    fn test_pick_peaks_respects_wait() {
        let config = OnsetConfig {
            wait_s: 0.1,
            ..OnsetConfig::default()
        };
        // 22050 / 512 * 0.1 = 4 frames of wait
        let mut envelope = vec![0.0f32; 40];
        envelope[10] = 1.0;
        envelope[12] = 0.9;
        envelope[30] = 1.0;

        let peaks = pick_peaks(&envelope, 22050, &config);
        assert_eq!(peaks, vec![10, 30]);
    }
}
