// Per-segment pitch estimation
// One global magnitude peak per segment, converted to a note name

use serde::{Deserialize, Serialize};

use crate::audio::onset::TimeSegment;
use crate::audio::stft::{time_to_frame, DspError};
use crate::audio::AudioBuffer;
use crate::pitch::note_name::frequency_to_note_name;
use crate::pitch::piptrack::{piptrack, PitchTrack};
use crate::pitch::PitchConfig;

/// Estimator output for one segment, times rounded to milliseconds
///
/// `note_name` is `None` when the segment has no usable pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNote {
    pub note_name: Option<String>,
    pub start: f64,
    pub end: f64,
}

/// Round seconds to 3 decimal places
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// Strongest candidate over a frame range: `(frequency, magnitude)`
///
/// The bin holding the largest magnitude anywhere in the range wins; its
/// frequency is the highest interpolated pitch that bin reached in the range.
fn peak_candidate(track: &PitchTrack, frames: std::ops::Range<usize>) -> Option<(f32, f32)> {
    let rows = &track.magnitudes[frames.clone()];
    let n_bins = track.n_bins();

    let mut bin_peaks = vec![f32::NEG_INFINITY; n_bins];
    for frame in rows {
        for (peak, &mag) in bin_peaks.iter_mut().zip(frame) {
            *peak = peak.max(mag);
        }
    }

    // First bin wins ties
    let mut best: Option<(usize, f32)> = None;
    for (bin, &peak) in bin_peaks.iter().enumerate() {
        if best.map_or(true, |(_, best_mag)| peak > best_mag) {
            best = Some((bin, peak));
        }
    }
    let (bin, magnitude) = best?;

    let frequency = track.pitches[frames]
        .iter()
        .map(|frame| frame[bin])
        .fold(f32::NEG_INFINITY, f32::max);

    Some((frequency, magnitude))
}

/// Estimate the note of one segment against a precomputed pitch track
pub fn estimate_segment(
    track: &PitchTrack,
    segment: &TimeSegment,
    sample_rate: u32,
    config: &PitchConfig,
) -> RawNote {
    let start = round_millis(segment.start);
    let end = round_millis(segment.end);
    let unpitched = RawNote {
        note_name: None,
        start,
        end,
    };

    let n_frames = track.n_frames();
    let frame_start = time_to_frame(segment.start, sample_rate, config.hop_length).min(n_frames);
    let frame_end = time_to_frame(segment.end, sample_rate, config.hop_length).min(n_frames);

    if frame_end <= frame_start {
        log::warn!(
            "Segment {:.3}-{:.3} s covers no analysis frames, skipping",
            segment.start,
            segment.end
        );
        return unpitched;
    }

    match peak_candidate(track, frame_start..frame_end) {
        Some((frequency, magnitude)) if frequency > 0.0 && magnitude >= config.min_magnitude => {
            RawNote {
                note_name: frequency_to_note_name(frequency),
                start,
                end,
            }
        }
        _ => unpitched,
    }
}

/// Estimate one raw note per segment, in segment order
pub fn estimate(
    harmonic: &AudioBuffer,
    segments: &[TimeSegment],
    config: &PitchConfig,
) -> Result<Vec<RawNote>, DspError> {
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let track = piptrack(harmonic, config)?;
    let sample_rate = harmonic.sample_rate();

    Ok(segments
        .iter()
        .map(|segment| estimate_segment(&track, segment, sample_rate, config))
        .collect())
}
